use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::{Error, Frame};

pub struct Connection {
    pub id: Uuid,
    // Data read from the socket is buffered by the codec until a whole frame can be parsed.
    frames: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            frames: Framed::new(stream, FrameCodec::new()),
        }
    }

    /// Reads the next request. `Ok(None)` means the peer closed the connection cleanly, between
    /// two frames.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.frames.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        self.frames.send(frame).await
    }
}
