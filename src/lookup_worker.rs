//! Background worker answering title lookup requests from the bus.

use log::{debug, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::protocol::{Message, ReferenceMessage};
use crate::reference_labels::TitleLookup;

pub struct LookupWorker {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    lookup: Box<dyn TitleLookup>,
}

impl LookupWorker {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        lookup: Box<dyn TitleLookup>,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            lookup,
        }
    }

    fn handle_message(&mut self, message: Message) {
        let Message::Reference(ReferenceMessage::LookupRequested {
            generation,
            song_id,
            urls,
        }) = message
        else {
            return;
        };
        debug!(
            "LookupWorker: resolving {} link(s) for song {}",
            urls.len(),
            song_id
        );
        let result = self.lookup.lookup_titles(&urls);
        if let Err(err) = &result {
            warn!("LookupWorker: lookup for song {} failed: {}", song_id, err);
        }
        let _ = self
            .bus_producer
            .send(Message::Reference(ReferenceMessage::LookupFinished {
                generation,
                song_id,
                urls,
                result,
            }));
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("LookupWorker: bus lagged, skipped {} message(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LookupWorker;
    use crate::protocol::{Message, ReferenceMessage};
    use crate::reference_labels::tests::ScriptedLookup;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    #[test]
    fn test_request_produces_tagged_result() {
        let (bus_sender, _) = broadcast::channel(16);
        let lookup = ScriptedLookup::with_titles(&[("https://youtu.be/aaaaaaaaaaa", "Hymn")]);
        let mut worker =
            LookupWorker::new(bus_sender.subscribe(), bus_sender.clone(), Box::new(lookup));
        let mut observer = bus_sender.subscribe();
        let generation = Uuid::new_v4();

        worker.handle_message(Message::Reference(ReferenceMessage::LookupRequested {
            generation,
            song_id: "s1".to_string(),
            urls: vec!["https://youtu.be/aaaaaaaaaaa".to_string()],
        }));

        let message = observer
            .try_recv()
            .expect("lookup result should be emitted");
        let Message::Reference(ReferenceMessage::LookupFinished {
            generation: result_generation,
            song_id,
            result,
            ..
        }) = message
        else {
            panic!("unexpected message emitted by lookup worker");
        };
        assert_eq!(result_generation, generation);
        assert_eq!(song_id, "s1");
        assert_eq!(result.expect("lookup succeeds")[0].title, "Hymn");
    }

    #[test]
    fn test_unrelated_messages_are_ignored() {
        let (bus_sender, _) = broadcast::channel(16);
        let mut worker = LookupWorker::new(
            bus_sender.subscribe(),
            bus_sender.clone(),
            Box::new(ScriptedLookup::default()),
        );
        let mut observer = bus_sender.subscribe();
        worker.handle_message(Message::Reference(ReferenceMessage::LabelsRequested {
            song_id: "s1".to_string(),
        }));
        assert!(observer.try_recv().is_err());
    }
}
