//! GPU handles and the typed command stream.
//!
//! The collector never talks to a GPU API directly. It references backend
//! objects through opaque handles and appends typed commands to a
//! [`CommandStream`], which a backend translates into its own API calls.
//! The stream is append-only from the collector's point of view; nothing
//! in this crate reads commands back.

/// Handle to a GPU buffer owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Handle to a compiled render pipeline owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u64);

/// A single typed GPU command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Bind a render pipeline.
    BindPipeline { pipeline: PipelineHandle },
    /// Bind a vertex buffer with the given per-vertex stride.
    BindVertexBuffer { buffer: BufferHandle, stride: u32 },
    /// Bind an index buffer.
    BindIndexBuffer { buffer: BufferHandle },
    /// Push the base offset of the current batch in the per-frame
    /// instance-argument table. Written before every draw since it varies
    /// per batch.
    PushConstants { first_instance_arg: u32 },
    /// Indexed, instanced draw.
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        base_index: u32,
        base_vertex: u32,
    },
    /// Non-indexed, instanced draw (vertex-only geometry).
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
        base_vertex: u32,
    },
}

/// An append-only sequence of typed GPU commands for one pass.
#[derive(Debug, Default)]
pub struct CommandStream {
    commands: Vec<Command>,
}

impl CommandStream {
    /// Creates an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stream with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Appends one command.
    #[inline]
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Returns the recorded commands in append order.
    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of recorded commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when nothing has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Clears the stream for reuse, keeping its allocation.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
