//! Out-of-band alerting.
//!
//! The SDK raises an alert when it cannot obtain an access token. Delivery
//! is up to the application (mail, chat, pager); the SDK only calls
//! [`Notifier::notify`] on a background task and never waits for it.

use std::sync::Arc;

/// Receives alert messages.
///
/// Implementations may block (e.g. send mail synchronously); they run on
/// tokio's blocking pool, never on the caller's task.
pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &str, body: &str);
}

/// Default notifier: writes the alert to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str) {
        log::error!("{subject}: {body}");
    }
}

impl<F> Notifier for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn notify(&self, subject: &str, body: &str) {
        self(subject, body)
    }
}

/// Fires `notifier` without awaiting it. Panics inside the notifier stay
/// inside the spawned task.
pub(crate) fn fire_and_forget(notifier: &Arc<dyn Notifier>, subject: String, body: String) {
    let notifier = Arc::clone(notifier);
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || notifier.notify(&subject, &body));
        }
        Err(_) => log::warn!("no tokio runtime available, dropping alert: {subject}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_fire_and_forget_delivers() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let notifier: Arc<dyn Notifier> = Arc::new(move |subject: &str, body: &str| {
            sink.lock().unwrap().push(format!("{subject}|{body}"));
        });

        fire_and_forget(&notifier, "subject".into(), "body".into());

        for _ in 0..50 {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(received.lock().unwrap().as_slice(), ["subject|body"]);
    }

    #[tokio::test]
    async fn test_panicking_notifier_does_not_propagate() {
        let notifier: Arc<dyn Notifier> = Arc::new(|_: &str, _: &str| panic!("mail server down"));
        fire_and_forget(&notifier, "subject".into(), "body".into());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn test_fire_and_forget_without_runtime() {
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        fire_and_forget(&notifier, "subject".into(), "body".into());
    }
}
