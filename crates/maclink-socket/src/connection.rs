use maclink_frame::{FrameConfig, FrameReader, FrameWriter};
use maclink_transport::{Endpoint, IpcStream, UnixDomainSocket};
use tracing::debug;

use crate::error::Result;

/// Both halves of one framed stream connection.
pub(crate) struct Connection {
    pub(crate) reader: FrameReader<IpcStream>,
    pub(crate) writer: FrameWriter<IpcStream>,
}

impl Connection {
    pub(crate) fn connect(endpoint: &Endpoint, config: FrameConfig) -> Result<Self> {
        let stream = UnixDomainSocket::connect_endpoint(endpoint)?;
        debug!(endpoint = %endpoint, "connected");
        Self::from_stream(stream, config)
    }

    pub(crate) fn from_stream(stream: IpcStream, config: FrameConfig) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        let reader = FrameReader::with_config_ipc(reader_stream, config.clone())?;
        let writer = FrameWriter::with_config_ipc(stream, config)?;
        Ok(Self { reader, writer })
    }

    /// Shut both directions down so any thread blocked on the stream wakes.
    pub(crate) fn shutdown(&self) {
        if let Err(err) = self.writer.get_ref().shutdown() {
            debug!(error = %err, "stream shutdown failed");
        }
    }
}
