//! Audio output
//!
//! The scheduler plays encoded audio blobs through the [`AudioOutput`]
//! trait. [`RodioOutput`] is the production implementation: a dedicated
//! thread owns the OS output stream (rodio's stream handle is not Send) and
//! plays one clip at a time; tests substitute an in-memory fake.

use crate::error::{Error, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// Handle to an in-flight clip; dropping it lets the clip play out
#[derive(Debug)]
pub struct AudioHandle {
    stop_tx: Option<oneshot::Sender<()>>,
}

impl AudioHandle {
    /// Wrap the stop side of a clip's control channel
    pub fn new(stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            stop_tx: Some(stop_tx),
        }
    }

    /// Stop the clip as soon as the output thread observes the signal
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Playback sink for encoded audio clips
pub trait AudioOutput: Send + Sync {
    /// Start playing a clip
    ///
    /// Returns a stop handle and a receiver that resolves when the clip
    /// ends (or fails). Stopping resolves the receiver with `Ok`.
    fn play(&self, clip: Vec<u8>) -> Result<(AudioHandle, oneshot::Receiver<Result<()>>)>;
}

/// Job queued to the audio thread
struct Job {
    clip: Vec<u8>,
    stop_rx: oneshot::Receiver<()>,
    done_tx: oneshot::Sender<Result<()>>,
}

/// rodio-backed output on a dedicated thread
pub struct RodioOutput {
    tx: mpsc::UnboundedSender<Job>,
}

impl RodioOutput {
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        std::thread::Builder::new()
            .name("narravox-audio".to_string())
            .spawn(move || audio_thread(rx))?;
        Ok(Self { tx })
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, clip: Vec<u8>) -> Result<(AudioHandle, oneshot::Receiver<Result<()>>)> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Job {
                clip,
                stop_rx,
                done_tx,
            })
            .map_err(|_| Error::Audio("audio output thread is gone".to_string()))?;
        Ok((AudioHandle::new(stop_tx), done_rx))
    }
}

fn audio_thread(mut rx: mpsc::UnboundedReceiver<Job>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            error!("No audio output device available: {}", e);
            while let Some(job) = rx.blocking_recv() {
                let _ = job
                    .done_tx
                    .send(Err(Error::Audio(format!("no output device: {}", e))));
            }
            return;
        }
    };

    while let Some(mut job) = rx.blocking_recv() {
        let result = play_clip(&handle, job.clip, &mut job.stop_rx);
        let _ = job.done_tx.send(result);
    }
    debug!("Audio output thread shutting down");
}

fn play_clip(
    handle: &OutputStreamHandle,
    clip: Vec<u8>,
    stop_rx: &mut oneshot::Receiver<()>,
) -> Result<()> {
    let sink = Sink::try_new(handle).map_err(|e| Error::Audio(e.to_string()))?;
    let source = Decoder::new(Cursor::new(clip)).map_err(|e| Error::Audio(e.to_string()))?;
    sink.append(source);

    loop {
        if stop_rx.try_recv().is_ok() {
            sink.stop();
            return Ok(());
        }
        if sink.empty() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
