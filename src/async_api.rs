use crate::cdp::CdpLauncher;
use crate::{ConversionConfig, ConversionSummary, Converter, Error, Launcher, RenderRequest, Result};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Convert(RenderRequest, oneshot::Sender<Result<ConversionSummary>>),
    Shutdown(oneshot::Sender<()>),
}

/// An async-friendly converter backed by a dedicated worker thread.
///
/// The worker owns a synchronous [`Converter`] and runs requests one at a
/// time, in submission order, so async callers never block their runtime on
/// browser work. Each request still gets its own browser, released when that
/// request finishes.
#[derive(Clone)]
pub struct AsyncConverter {
    cmd_tx: Sender<Command>,
}

impl AsyncConverter {
    /// Spawn the worker thread with headless Chrome.
    pub fn new(config: Option<ConversionConfig>) -> Self {
        Self::with_launcher(CdpLauncher::default(), config.unwrap_or_default())
    }

    /// Spawn the worker thread around any launcher. Targets are created and
    /// dropped on the worker, so only the launcher has to be `Send`.
    pub fn with_launcher<L>(launcher: L, config: ConversionConfig) -> Self
    where
        L: Launcher + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();

        thread::spawn(move || {
            let converter = Converter::new(launcher, config);

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Convert(request, resp) => {
                        let res = converter.run(&request);
                        let _ = resp.send(res);
                    }
                    Command::Shutdown(resp) => {
                        let _ = resp.send(());
                        break;
                    }
                }
            }
        });

        Self { cmd_tx }
    }

    /// Queue a conversion and wait for its result
    pub async fn convert(&self, request: RenderRequest) -> Result<ConversionSummary> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Convert(request, tx))
            .map_err(|_| Error::Other("Converter worker has stopped".into()))?;
        rx.await
            .map_err(|e| Error::Other(format!("Convert canceled: {}", e)))?
    }

    /// Stop the worker after the conversions already queued.
    pub async fn shutdown(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Shutdown(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Shutdown canceled: {}", e)))
    }
}
