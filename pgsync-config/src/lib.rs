//! Configuration of the table sync service: the layered YAML loader, the runtime environment and
//! the types shared by the sync engine and its binary.

mod environment;
mod secret;
pub mod shared;

pub use environment::*;
pub use secret::*;
use serde::de::DeserializeOwned;

const CONFIGURATION_DIR: &str = "configuration";
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Overrides are read from variables like `APP_SOURCE__HOST`, which sets `source.host`.
const ENV_PREFIX: &str = "APP";
const ENV_PREFIX_SEPARATOR: &str = "_";
const ENV_SEPARATOR: &str = "__";

/// `APP_SYNC__TABLES_TO_SYNC=orders,public.users` sets a two element list.
const LIST_SEPARATOR: &str = ",";

/// A configuration type loadable with [`load_config`].
pub trait Config {
    /// Keys whose environment overrides are split on `,` into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Loads `T` from `configuration/base.yaml`, then `configuration/{environment}.yaml` if present,
/// then the `APP_` prefixed environment variables, each layer overriding the previous one.
pub fn load_config<T>() -> Result<T, config::ConfigError>
where
    T: Config + DeserializeOwned,
{
    let configuration_directory = std::env::current_dir()
        .map_err(|err| {
            config::ConfigError::Message(format!(
                "failed to determine the current directory: {err}"
            ))
        })?
        .join(CONFIGURATION_DIR);

    let environment = Environment::load().map_err(|err| {
        config::ConfigError::Message(format!("failed to parse APP_ENVIRONMENT: {err}"))
    })?;

    config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join(BASE_CONFIG_FILE),
        ))
        .add_source(
            config::File::from(configuration_directory.join(format!("{environment}.yaml")))
                .required(false),
        )
        .add_source(environment_overrides(T::LIST_PARSE_KEYS))
        .build()?
        .try_deserialize::<T>()
}

fn environment_overrides(list_keys: &[&str]) -> config::Environment {
    let source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if list_keys.is_empty() {
        return source;
    }

    list_keys.iter().fold(
        source.try_parsing(true).list_separator(LIST_SEPARATOR),
        |source, key| source.with_list_parse_key(key),
    )
}
