use bytes::{Bytes, BytesMut};
use core::pin::Pin;
use core::task::{Context, Poll};
use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// A stream adapter that re-chunks a byte stream into chunks of at most `chunk_size` bytes.
    ///
    /// Small pieces are coalesced and large pieces are split. Whatever is buffered is emitted as
    /// soon as the inner stream has nothing ready, so a slow producer never stalls the consumer
    /// waiting for a full chunk.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct ChunkedStream<S, E> {
        #[pin]
        stream: S,
        buffer: BytesMut,
        chunk_size: usize,
        inner_stream_ended: bool,
        _error: core::marker::PhantomData<E>,
    }
}

impl<S, E> ChunkedStream<S, E>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    /// Wraps `stream`, emitting chunks of at most `chunk_size` bytes.
    ///
    /// A `chunk_size` of zero is treated as one.
    pub fn wrap(stream: S, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        ChunkedStream {
            stream,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
            inner_stream_ended: false,
            _error: core::marker::PhantomData,
        }
    }
}

impl<S, E> Stream for ChunkedStream<S, E>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if this.buffer.len() >= *this.chunk_size {
                let chunk = this.buffer.split_to(*this.chunk_size).freeze();
                return Poll::Ready(Some(Ok(chunk)));
            }

            if *this.inner_stream_ended {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }

                return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
            }

            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(err))) => {
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    *this.inner_stream_ended = true;
                }
                Poll::Pending => {
                    if this.buffer.is_empty() {
                        return Poll::Pending;
                    }

                    return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
                }
            }
        }
    }
}
