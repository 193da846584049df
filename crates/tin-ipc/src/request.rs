use bytes::Bytes;

use crate::buffer::{Buffer, BufferAttr};
use crate::session::Session;

/// One outgoing call: command id, raw input scalars, tagged buffers,
/// and the shape of the expected reply.
///
/// ```text
/// ┌──────────────┬────────────────────────────────────────────────┐
/// │ Part         │ Meaning                                        │
/// ├──────────────┼────────────────────────────────────────────────┤
/// │ command      │ Numeric command id within the service          │
/// │ input        │ Fixed-size scalar block, copied in full        │
/// │ output_size  │ Bytes of scalar output the caller expects      │
/// │ buffers      │ Tagged byte ranges, borrowed for the call      │
/// │ object_count │ New sessions the call must hand back           │
/// └──────────────┴────────────────────────────────────────────────┘
/// ```
///
/// Scalars are packed by the caller (little-endian, natural alignment),
/// usually through [`bytes::BufMut`].
#[derive(Debug)]
pub struct Request<'a> {
    command: u32,
    input: Vec<u8>,
    output_size: usize,
    buffers: Vec<Buffer<'a>>,
    object_count: usize,
}

impl<'a> Request<'a> {
    #[must_use]
    pub fn new(command: u32) -> Self {
        Self {
            command,
            input: Vec::new(),
            output_size: 0,
            buffers: Vec::new(),
            object_count: 0,
        }
    }

    /// Attach the raw input scalar block.
    #[must_use]
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = input.into();
        self
    }

    /// Declare how many bytes of scalar output the reply must carry.
    #[must_use]
    pub fn output_size(mut self, size: usize) -> Self {
        self.output_size = size;
        self
    }

    #[must_use]
    pub fn in_buffer(mut self, data: &'a [u8], attr: BufferAttr) -> Self {
        self.buffers.push(Buffer::In {
            data,
            attr: attr | BufferAttr::IN,
        });
        self
    }

    #[must_use]
    pub fn out_buffer(mut self, data: &'a mut [u8], attr: BufferAttr) -> Self {
        self.buffers.push(Buffer::Out {
            data,
            attr: attr | BufferAttr::OUT,
        });
        self
    }

    /// Declare how many session objects the reply must carry.
    #[must_use]
    pub fn objects(mut self, count: usize) -> Self {
        self.object_count = count;
        self
    }

    // ── Service side accessors ────────────────────────────────────────

    pub fn command(&self) -> u32 {
        self.command
    }

    pub fn input_bytes(&self) -> &[u8] {
        &self.input
    }

    pub fn expected_output_size(&self) -> usize {
        self.output_size
    }

    pub fn expected_objects(&self) -> usize {
        self.object_count
    }

    pub fn buffers(&self) -> &[Buffer<'a>] {
        &self.buffers
    }

    /// The `index`-th buffer, if it is an input buffer.
    pub fn in_buffer_at(&self, index: usize) -> Option<&[u8]> {
        match self.buffers.get(index)? {
            Buffer::In { data, .. } => Some(data),
            Buffer::Out { .. } => None,
        }
    }

    /// The `index`-th buffer, if it is an output buffer.
    pub fn out_buffer_at(&mut self, index: usize) -> Option<&mut [u8]> {
        match self.buffers.get_mut(index)? {
            Buffer::Out { data, .. } => Some(data),
            Buffer::In { .. } => None,
        }
    }
}

/// Reply to a successful call.
///
/// Owns a copy of the scalar output and the sessions the service
/// returned. Sessions are reference-counted handles; a caller keeps a
/// service object alive simply by holding on to it.
#[derive(Default)]
pub struct Response {
    output: Bytes,
    objects: Vec<Session>,
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<Bytes>) -> Self {
        self.output = output.into();
        self
    }

    #[must_use]
    pub fn with_object(mut self, object: Session) -> Self {
        self.objects.push(object);
        self
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Take ownership of the next returned session, front to back.
    pub fn take_object(&mut self) -> Option<Session> {
        if self.objects.is_empty() {
            None
        } else {
            Some(self.objects.remove(0))
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("output", &self.output)
            .field("objects", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_tags_buffer_direction() {
        let input = [1u8, 2, 3];
        let mut output = [0u8; 4];
        let mut request = Request::new(4)
            .input(vec![9u8; 16])
            .in_buffer(&input, BufferAttr::MAP_ALIAS)
            .out_buffer(&mut output, BufferAttr::POINTER);

        assert_eq!(request.command(), 4);
        assert_eq!(request.input_bytes().len(), 16);
        assert!(request.buffers()[0].attr().is_in());
        assert!(request.buffers()[1].attr().is_out());
        assert_eq!(request.in_buffer_at(0), Some(&input[..]));
        assert!(request.in_buffer_at(1).is_none());

        request.out_buffer_at(1).unwrap().copy_from_slice(b"abcd");
        drop(request);
        assert_eq!(&output, b"abcd");
    }

    #[test]
    fn response_hands_out_objects_in_order() {
        let mut response = Response::new().with_output(vec![1u8, 0, 0, 0]);
        assert_eq!(response.output(), &[1, 0, 0, 0]);
        assert_eq!(response.object_count(), 0);
        assert!(response.take_object().is_none());
    }
}
