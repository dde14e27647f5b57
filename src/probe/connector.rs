//! Connection establishment.

use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::endpoint::Target;

/// Opens connections to targets.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(&self, target: &Target) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, target: &Target) -> impl Future<Output = io::Result<TcpStream>> + Send {
        let addr = target.to_string();
        async move {
            let stream = TcpStream::connect(addr).await?;
            // Requests are written in one batch; don't hold them back.
            stream.set_nodelay(true)?;
            Ok(stream)
        }
    }
}
