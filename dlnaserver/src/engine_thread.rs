//! Thread propriétaire du [`DeviceEngine`].
//!
//! Le moteur n'est jamais partagé : les handlers HTTP lui transmettent les
//! requêtes par un canal et reçoivent la réponse par un `oneshot`. Entre deux
//! commandes le thread fait tourner `poll` toutes les `loop_delay`.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use dlnaupnp::engine::DeviceEngine;
use dlnaupnp::http::{BufferedReply, BufferedRequest};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum EngineThreadError {
    #[error("Engine thread is not running")]
    Stopped,

    #[error("Engine failed to start: {0}")]
    Startup(String),

    #[error("Failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

enum Command {
    Http {
        request: BufferedRequest,
        reply: oneshot::Sender<BufferedReply>,
    },
    Shutdown,
}

/// Accès au moteur depuis les tâches tokio.
#[derive(Clone)]
pub struct EngineClient {
    commands: Sender<Command>,
}

impl EngineClient {
    /// Fait traiter une requête HTTP par le moteur.
    pub async fn call(&self, request: BufferedRequest) -> Result<BufferedReply, EngineThreadError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Http { request, reply: tx })
            .map_err(|_| EngineThreadError::Stopped)?;
        rx.await.map_err(|_| EngineThreadError::Stopped)
    }
}

/// Thread du moteur.
pub struct EngineThread {
    client: EngineClient,
    join: Option<JoinHandle<()>>,
}

impl EngineThread {
    /// Construit le moteur dans un nouveau thread, appelle `begin` puis
    /// démarre la boucle.
    ///
    /// `build` s'exécute dans le thread du moteur : c'est là que doivent être
    /// créés les collaborateurs bloquants (client HTTP des NOTIFY...).
    pub async fn spawn<F>(build: F) -> Result<Self, EngineThreadError>
    where
        F: FnOnce() -> anyhow::Result<DeviceEngine> + Send + 'static,
    {
        let (commands, inbox) = unbounded();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

        let join = thread::Builder::new()
            .name("dlna-engine".into())
            .spawn(move || {
                let mut engine = match build().and_then(|mut engine| {
                    engine.begin(Instant::now())?;
                    Ok(engine)
                }) {
                    Ok(engine) => engine,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("{:#}", e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                run(&mut engine, &inbox);
            })?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                client: EngineClient { commands },
                join: Some(join),
            }),
            Ok(Err(message)) => {
                let _ = join.join();
                Err(EngineThreadError::Startup(message))
            }
            Err(_) => {
                let _ = join.join();
                Err(EngineThreadError::Startup("engine thread exited".to_string()))
            }
        }
    }

    pub fn client(&self) -> EngineClient {
        self.client.clone()
    }

    /// Demande l'arrêt (byebye compris) et attend la fin du thread.
    ///
    /// Bloquant : depuis tokio, passer par `spawn_blocking`.
    pub fn shutdown(mut self) {
        let _ = self.client.commands.send(Command::Shutdown);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("❌ Engine thread panicked");
            }
        }
    }
}

fn run(engine: &mut DeviceEngine, inbox: &Receiver<Command>) {
    let loop_delay = engine.config().loop_delay.max(Duration::from_millis(1));
    info!("🚀 Engine loop running");
    loop {
        engine.poll(Instant::now());
        match inbox.recv_timeout(loop_delay) {
            Ok(Command::Http { mut request, reply }) => {
                let mut out = BufferedReply::new();
                engine.handle_http(&mut request, &mut out, Instant::now());
                if reply.send(out).is_err() {
                    debug!("HTTP client went away before the reply");
                }
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    engine.end();
}
