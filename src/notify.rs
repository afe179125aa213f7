//! Cross-surface change notices
//!
//! Fire-and-forget: a recipient that fails or is gone never surfaces an
//! error to the sender.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Something other open views should react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeNotice {
    SettingsChanged,
    VocabularyChanged,
}

impl ChangeNotice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeNotice::SettingsChanged => "settingsChanged",
            ChangeNotice::VocabularyChanged => "vocabularyChanged",
        }
    }
}

/// Best-effort broadcast channel
pub trait Broadcaster {
    fn broadcast(&self, notice: ChangeNotice);
}

type Recipient = Box<dyn Fn(ChangeNotice) -> Result<(), String>>;

/// In-process broadcaster with any number of recipients
#[derive(Default)]
pub struct NoticeBus {
    recipients: RefCell<Vec<Recipient>>,
}

impl NoticeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, recipient: impl Fn(ChangeNotice) -> Result<(), String> + 'static) {
        self.recipients.borrow_mut().push(Box::new(recipient));
    }

    pub fn recipient_count(&self) -> usize {
        self.recipients.borrow().len()
    }
}

impl Broadcaster for NoticeBus {
    fn broadcast(&self, notice: ChangeNotice) {
        for recipient in self.recipients.borrow().iter() {
            if let Err(e) = recipient(notice) {
                console_warn!("[NoticeBus] Recipient failed on {}: {}", notice.as_str(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_broadcast_reaches_every_recipient() {
        let bus = NoticeBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..2 {
            let seen = seen.clone();
            bus.subscribe(move |n| {
                seen.borrow_mut().push(n);
                Ok(())
            });
        }

        bus.broadcast(ChangeNotice::VocabularyChanged);
        assert_eq!(*seen.borrow(), vec![ChangeNotice::VocabularyChanged; 2]);
    }

    #[test]
    fn test_failing_recipient_does_not_stop_delivery() {
        let bus = NoticeBus::new();
        let seen = Rc::new(RefCell::new(0));
        bus.subscribe(|_| Err("view closed".to_string()));
        let counter = seen.clone();
        bus.subscribe(move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        bus.broadcast(ChangeNotice::SettingsChanged);
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_broadcast_without_recipients_is_fine() {
        let bus = NoticeBus::new();
        bus.broadcast(ChangeNotice::SettingsChanged);
        assert_eq!(bus.recipient_count(), 0);
    }

    #[test]
    fn test_notice_wire_names() {
        assert_eq!(serde_json::to_string(&ChangeNotice::VocabularyChanged).unwrap(), "\"vocabularyChanged\"");
    }
}
