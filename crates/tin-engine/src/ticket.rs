use tin_container::{Container, Entry};
use tin_ipc::{BufferAttr, IpcError, Request, Service, ServiceManager};

use crate::error::InstallError;

/// Command ids of the `es` service.
pub mod cmd {
    pub const IMPORT_TICKET: u32 = 1;
}

/// The ticket service (`es`).
#[derive(Clone, Debug)]
pub struct TicketService {
    service: Service,
}

impl TicketService {
    /// # Errors
    ///
    /// [`IpcError::ServiceUnavailable`] when `es` cannot be opened.
    pub fn open(services: &dyn ServiceManager) -> Result<Self, IpcError> {
        let session = services.get_service("es")?;
        Ok(Self {
            service: Service::new("es", session),
        })
    }

    /// Install a ticket and its certificate chain in one call.
    ///
    /// # Errors
    ///
    /// Any IPC failure.
    pub fn import(&self, ticket: &[u8], cert: &[u8]) -> Result<(), IpcError> {
        self.service
            .call(
                Request::new(cmd::IMPORT_TICKET)
                    .in_buffer(ticket, BufferAttr::MAP_ALIAS)
                    .in_buffer(cert, BufferAttr::MAP_ALIAS),
            )
            .map(|_| ())
    }
}

/// A `.tik` entry and its matching `.cert` entry.
#[derive(Clone, Debug)]
pub struct TicketPair {
    pub ticket: Entry,
    pub cert: Entry,
}

/// Pair every `<id>.tik` in the container with `<id>.cert`.
///
/// Runs before any service is opened, so a package with a dangling
/// ticket fails without touching the console.
///
/// # Errors
///
/// [`InstallError::MissingFile`] naming the absent certificate.
pub fn ticket_pairs(container: &Container) -> Result<Vec<TicketPair>, InstallError> {
    container
        .with_suffix(".tik")
        .map(|ticket| {
            let stem = ticket.name().strip_suffix(".tik").unwrap_or(ticket.name());
            let cert_name = format!("{stem}.cert");
            let cert = container
                .get(&cert_name)
                .ok_or(InstallError::MissingFile { name: cert_name })?;
            Ok(TicketPair {
                ticket: ticket.clone(),
                cert: cert.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tin_container::{MemoryBlob, Pfs0Builder};

    use super::*;

    async fn container(names: &[&str]) -> Container {
        let image = names
            .iter()
            .fold(Pfs0Builder::new(), |b, name| b.add(*name, name.as_bytes().to_vec()))
            .build();
        Container::parse(Arc::new(MemoryBlob::new(image))).await.unwrap()
    }

    #[tokio::test]
    async fn pairs_ticket_with_cert() {
        let c = container(&["aa.tik", "aa.cert", "bb.nca"]).await;
        let pairs = ticket_pairs(&c).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].ticket.name(), "aa.tik");
        assert_eq!(pairs[0].cert.name(), "aa.cert");
    }

    #[tokio::test]
    async fn missing_cert_is_reported_by_name() {
        let c = container(&["aa.tik", "bb.cert"]).await;
        let err = ticket_pairs(&c).unwrap_err();
        assert!(matches!(err, InstallError::MissingFile { name } if name == "aa.cert"));
    }

    #[tokio::test]
    async fn no_tickets_is_fine() {
        let c = container(&["aa.cnmt.nca"]).await;
        assert!(ticket_pairs(&c).unwrap().is_empty());
    }
}
