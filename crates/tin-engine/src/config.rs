use tin_wire::StorageId;

/// Configuration for an install run.
///
/// ```text
/// ┌──────────────────────┬──────────────────────────────────────────────┐
/// │ Field                │ Purpose                                      │
/// ├──────────────────────┼──────────────────────────────────────────────┤
/// │ storage_id           │ Volume that receives content and meta        │
/// │ write_chunk_size     │ Largest single placeholder write             │
/// │ step_queue_depth     │ Capacity of the step channel                 │
/// │ record_page_capacity │ Registry records fetched per list call       │
/// └──────────────────────┴──────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug)]
pub struct InstallConfig {
    /// Target volume. Also written into every installed meta record and
    /// every content storage record pushed to the registry.
    pub storage_id: StorageId,

    /// Bytes per `WritePlaceHolder` call. Each chunk emits one
    /// `Progress` step.
    pub write_chunk_size: usize,

    /// Steps buffered before the install task waits for the caller.
    pub step_queue_depth: usize,

    /// Capacity of the out buffer for each registry enumeration page.
    pub record_page_capacity: usize,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            storage_id: StorageId::SdCard,
            write_chunk_size: 0x10_0000,
            step_queue_depth: 64,
            record_page_capacity: 32,
        }
    }
}
