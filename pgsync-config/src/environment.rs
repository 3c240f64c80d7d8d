use std::fmt;
use std::io::Error;
use std::str::FromStr;

/// Variable selecting which configuration file is layered over `base.yaml`.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

/// Where the sync service runs.
///
/// Picks `configuration/{environment}.yaml` and decides whether logs go to rolling files or to
/// the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Prod,
    Staging,
    Dev,
}

impl Environment {
    const ALL: [Environment; 3] = [Self::Prod, Self::Staging, Self::Dev];

    /// Reads `APP_ENVIRONMENT`, falling back to [`Environment::Prod`] when it is unset.
    pub fn load() -> Result<Environment, Error> {
        match std::env::var(APP_ENVIRONMENT_ENV_NAME) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::default()),
        }
    }

    /// Exports this environment as `APP_ENVIRONMENT` for the current process.
    pub fn set(&self) {
        unsafe { std::env::set_var(APP_ENVIRONMENT_ENV_NAME, self.as_str()) }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Staging => "staging",
            Self::Dev => "dev",
        }
    }

    /// Staging runs with the production logging setup.
    pub fn is_prod(&self) -> bool {
        !matches!(self, Self::Dev)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.to_lowercase();

        Self::ALL
            .into_iter()
            .find(|environment| environment.as_str() == value)
            .ok_or_else(|| {
                let supported: Vec<_> = Self::ALL.iter().map(Environment::as_str).collect();
                Error::other(format!(
                    "unknown environment '{value}', expected one of: {}",
                    supported.join(", ")
                ))
            })
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
