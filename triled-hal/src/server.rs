//! TCP dispatch server
//!
//! Accepts clients speaking the TriLED line protocol and forwards their
//! requests to the shared [`Light`] service, one thread per client.

use anyhow::Result;
use log::{debug, error, info};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use triled_protocol::{LightDispatch, Session};

use crate::light::Light;

/// Longest command line accepted, terminator included, before the client is dropped
const MAX_LINE_LEN: usize = 256;

pub struct Server {
    listener: TcpListener,
    light: Arc<Light>,
}

impl Server {
    pub fn bind(addr: SocketAddr, light: Arc<Light>) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, light })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients forever.
    pub fn run(self) -> Result<()> {
        info!("Lights server listening on {}", self.local_addr()?);

        let light = self.light;
        accept_loop(self.listener.incoming(), |stream| {
            let light = Arc::clone(&light);
            std::thread::Builder::new()
                .name("triled-client".into())
                .spawn(move || {
                    if let Err(e) = handle_client(&stream, light.as_ref()) {
                        error!("Error handling client: {e:?}");
                    }
                })
                .map(drop)
        });
        Ok(())
    }
}

/// Hand each accepted connection to `spawn`. Accept and spawn failures are
/// logged and the loop moves on to the next connection.
fn accept_loop<S, I, F>(incoming: I, mut spawn: F)
where
    I: IntoIterator<Item = io::Result<S>>,
    F: FnMut(S) -> io::Result<()>,
{
    for stream in incoming {
        match stream {
            Ok(stream) => {
                if let Err(e) = spawn(stream) {
                    error!("Error spawning client thread: {e:?}");
                }
            }
            Err(e) => error!("Error accepting connection: {e:?}"),
        }
    }
}

fn handle_client(stream: &TcpStream, lights: &Light) -> Result<()> {
    let peer = stream.peer_addr()?;
    info!("Client connected: {peer}");

    serve_lines(BufReader::new(stream), stream, lights)?;

    info!("Client disconnected: {peer}");
    Ok(())
}

/// Answer commands from `reader` on `writer` until end of input.
fn serve_lines<R, W, L>(mut reader: R, mut writer: W, lights: &L) -> Result<()>
where
    R: BufRead,
    W: Write,
    L: LightDispatch + ?Sized,
{
    let mut session = Session::new();
    let mut buffer = Vec::with_capacity(64);

    loop {
        buffer.clear();
        let n = reader
            .by_ref()
            .take(MAX_LINE_LEN as u64 + 1)
            .read_until(b'\n', &mut buffer)?;
        if n == 0 {
            return Ok(());
        }
        if buffer.len() > MAX_LINE_LEN {
            writer.write_all(b"ERROR line too long\n")?;
            anyhow::bail!("command line exceeds {MAX_LINE_LEN} bytes");
        }

        let line = String::from_utf8_lossy(&buffer);
        debug!("RX: {}", line.trim_end());

        if let Some(reply) = session.handle_line(&line, lights) {
            debug!("TX: {}", reply.escape_debug());
            writer.write_all(reply.as_bytes())?;
            writer.flush()?;
        }
    }
}
