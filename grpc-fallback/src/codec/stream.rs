use crate::{body::BoxBody, client::Cancelable, Status};
use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use http_body::Body;
use std::{
    collections::VecDeque,
    fmt,
    pin::Pin,
    task::{ready, Context, Poll},
};
use tracing::{debug, trace};

/// One result of feeding bytes to a [`StreamArrayParser`].
#[derive(Debug)]
pub enum ParseEvent {
    /// The complete bytes of one top level array element.
    Element(Bytes),
    /// The closing `]` of the array was seen.
    End,
    /// The input is not a JSON array.
    Error(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingOpenBracket,
    Scanning {
        depth: usize,
        in_string: bool,
        escaped: bool,
    },
    Done,
}

/// Incrementally splits a streamed JSON array of objects into its elements.
///
/// Bytes can be fed in chunks of any size; chunk boundaries do not need to
/// line up with JSON tokens. An element that is still open when a chunk ends
/// is carried over and completed by later chunks.
///
/// ```rust
/// # use grpc_fallback::codec::{ParseEvent, StreamArrayParser};
/// let mut parser = StreamArrayParser::new();
/// assert!(parser.feed(br#"[{"a":"}"#).is_empty());
///
/// let events = parser.feed(br#""},{"b":1}]"#);
/// assert!(matches!(&events[0], ParseEvent::Element(e) if &e[..] == br#"{"a":"}"}"#));
/// assert!(matches!(&events[1], ParseEvent::Element(e) if &e[..] == br#"{"b":1}"#));
/// assert!(matches!(events[2], ParseEvent::End));
/// ```
#[derive(Debug)]
pub struct StreamArrayParser {
    state: State,
    carry: BytesMut,
}

impl Default for StreamArrayParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamArrayParser {
    /// Create a parser waiting for the opening `[`.
    pub fn new() -> Self {
        StreamArrayParser {
            state: State::AwaitingOpenBracket,
            carry: BytesMut::new(),
        }
    }

    /// Returns `true` once the array was closed, the input was rejected, or
    /// the parser was cancelled.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Stop parsing. Later input is ignored and nothing more is emitted.
    pub fn cancel(&mut self) {
        self.state = State::Done;
        self.carry.clear();
    }

    /// Signal the end of input, returning an error if the array was not
    /// closed.
    pub fn finish(&mut self) -> Option<Status> {
        if self.is_done() {
            return None;
        }
        self.cancel();
        Some(Status::internal("Unexpected EOF decoding stream."))
    }

    /// Scan `chunk`, returning the events it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        // Offset in `chunk` where the element being scanned starts.
        let mut start = match self.state {
            State::Scanning { depth, .. } if depth > 1 => Some(0),
            _ => None,
        };

        for (i, &byte) in chunk.iter().enumerate() {
            match &mut self.state {
                State::Done => break,
                State::AwaitingOpenBracket => {
                    if byte.is_ascii_whitespace() {
                        continue;
                    }
                    if byte != b'[' {
                        debug!("stream does not start with '[': {:?}", byte as char);
                        events.push(ParseEvent::Error(Status::internal(
                            "response stream is not a JSON array",
                        )));
                        self.state = State::Done;
                        break;
                    }
                    self.state = State::Scanning {
                        depth: 1,
                        in_string: false,
                        escaped: false,
                    };
                }
                State::Scanning {
                    depth,
                    in_string,
                    escaped,
                } => {
                    if *in_string {
                        if *escaped {
                            *escaped = false;
                        } else if byte == b'\\' {
                            *escaped = true;
                        } else if byte == b'"' {
                            *in_string = false;
                        }
                        continue;
                    }

                    match byte {
                        b'"' => *in_string = true,
                        b'{' => {
                            if *depth == 1 {
                                start = Some(i);
                            }
                            *depth += 1;
                        }
                        b'}' => {
                            *depth = depth.saturating_sub(1).max(1);
                            if *depth == 1 {
                                if let Some(from) = start.take() {
                                    let element = complete(&mut self.carry, &chunk[from..=i]);
                                    events.push(ParseEvent::Element(element));
                                }
                            }
                        }
                        b']' if *depth == 1 => {
                            trace!("end of stream array");
                            events.push(ParseEvent::End);
                            self.state = State::Done;
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        if let Some(from) = start {
            if !self.is_done() {
                self.carry.extend_from_slice(&chunk[from..]);
            }
        }

        events
    }
}

fn complete(carry: &mut BytesMut, tail: &[u8]) -> Bytes {
    if carry.is_empty() {
        Bytes::copy_from_slice(tail)
    } else {
        carry.extend_from_slice(tail);
        carry.split().freeze()
    }
}

type ElementDecoder<T> = Box<dyn Fn(&[u8]) -> Result<T, Status> + Send + 'static>;

/// A stream of messages decoded from a server streaming response.
///
/// Items are yielded as soon as their bytes have arrived. An element that
/// fails to decode is yielded as an `Err` and the stream keeps going; the
/// stream ends with `None` after the closing `]`. Transport failures and a
/// truncated array are yielded as a final `Err`.
pub struct Streaming<T> {
    body: BoxBody,
    parser: StreamArrayParser,
    pending: VecDeque<ParseEvent>,
    decoder: ElementDecoder<T>,
    canceler: Cancelable,
}

impl<T> Streaming<T> {
    pub(crate) fn new(body: BoxBody, decoder: ElementDecoder<T>, canceler: Cancelable) -> Self {
        Streaming {
            body,
            parser: StreamArrayParser::new(),
            pending: VecDeque::new(),
            decoder,
            canceler,
        }
    }

    /// Fetch the next message from this stream.
    ///
    /// ```rust
    /// # use grpc_fallback::{codec::Streaming, Status};
    /// # async fn run(mut stream: Streaming<String>) -> Result<(), Status> {
    /// while let Some(message) = stream.message().await? {
    ///     println!("{message}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn message(&mut self) -> Result<Option<T>, Status> {
        match futures_util::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(status)) => Err(status),
            None => Ok(None),
        }
    }

    /// Cancel the call. The stream ends without yielding anything more,
    /// including messages that were already received.
    pub fn cancel(&mut self) {
        self.canceler.cancel();
        self.shutdown();
    }

    /// A handle that cancels this stream from elsewhere.
    pub fn canceler(&self) -> Cancelable {
        self.canceler.clone()
    }

    fn shutdown(&mut self) {
        self.parser.cancel();
        self.pending.clear();
        self.body = crate::body::empty();
    }
}

impl<T> Stream for Streaming<T> {
    type Item = Result<T, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.canceler.is_cancelled() {
                if !this.parser.is_done() || !this.pending.is_empty() {
                    this.shutdown();
                }
                return Poll::Ready(None);
            }

            match this.pending.pop_front() {
                Some(ParseEvent::Element(bytes)) => return Poll::Ready(Some((this.decoder)(&bytes))),
                Some(ParseEvent::Error(status)) => return Poll::Ready(Some(Err(status))),
                Some(ParseEvent::End) => continue,
                None => {}
            }

            if this.parser.is_done() {
                return Poll::Ready(None);
            }

            match ready!(Pin::new(&mut this.body).poll_frame(cx)) {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        this.pending.extend(this.parser.feed(&data));
                    }
                }
                Some(Err(status)) => {
                    this.parser.cancel();
                    if status.is_abort() && this.canceler.is_cancelled() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Err(status)));
                }
                None => return Poll::Ready(this.parser.finish().map(Err)),
            }
        }
    }
}

impl<T> fmt::Debug for Streaming<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Streaming")
            .field("parser", &self.parser)
            .field("pending", &self.pending.len())
            .finish()
    }
}
