use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use crate::api::decoder::Utf8ChunkDecoder;
use crate::api::{AskRequest, CaseApi};
use crate::event::{AppEvent, NetEvent};
use crate::session::controller::{Effect, RequestId};

const READ_BUFFER: usize = 1024;

/// Runs controller effects off the UI thread. Each request gets its own
/// thread; its results come back as `AppEvent::Net` in the order it produced
/// them.
pub struct Worker {
    api: Arc<dyn CaseApi>,
    tx: Sender<AppEvent>,
}

impl Worker {
    pub fn new(api: Arc<dyn CaseApi>, tx: Sender<AppEvent>) -> Self {
        Self { api, tx }
    }

    pub fn dispatch(&self, effect: Effect) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        match effect {
            Effect::FetchCase { custom } => {
                thread::spawn(move || {
                    let result = api.start_game(custom.as_ref());
                    let _ = tx.send(AppEvent::Net(NetEvent::CaseLoaded(result)));
                });
            }
            Effect::FetchRandomCase { previous_disease } => {
                thread::spawn(move || {
                    let result = api.new_random_case(previous_disease.as_deref());
                    let _ = tx.send(AppEvent::Net(NetEvent::CaseLoaded(result)));
                });
            }
            Effect::Ask {
                request: id,
                question,
                context,
            } => {
                thread::spawn(move || {
                    let request = AskRequest {
                        question: &question,
                        patient_context: &context,
                    };
                    match api.ask(&request) {
                        Ok(reader) => stream_reply(id, reader, &tx),
                        Err(e) => {
                            let _ = tx.send(AppEvent::Net(NetEvent::RequestFailed(id, e)));
                        }
                    }
                });
            }
            Effect::SaveConversation(snapshot) => {
                thread::spawn(move || {
                    if let Err(e) = api.save_conversation(&snapshot) {
                        tracing::warn!(error = %e, "conversation snapshot not saved");
                    }
                });
            }
            Effect::Notify(notice) => {
                tracing::debug!(?notice, "notice reached the worker; nothing to run");
            }
        }
    }
}

/// Pump a reply body into chunk events tagged with `request` until EOF or a
/// read error.
pub fn stream_reply<R: Read>(request: RequestId, mut reader: R, tx: &Sender<AppEvent>) {
    let mut buf = [0u8; READ_BUFFER];
    let mut decoder = Utf8ChunkDecoder::new();
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                let tail = decoder.finish();
                if !tail.is_empty() {
                    let _ = tx.send(AppEvent::Net(NetEvent::StreamChunk(request, tail)));
                }
                let _ = tx.send(AppEvent::Net(NetEvent::StreamFinished(request)));
                return;
            }
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty()
                    && tx
                        .send(AppEvent::Net(NetEvent::StreamChunk(request, text)))
                        .is_err()
                {
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(AppEvent::Net(NetEvent::StreamFailed(request, e.into())));
                return;
            }
        }
    }
}
