use super::{Logger, Shared};
use crate::domain::{LogArg, Payload};
use parking_lot::Mutex;
use std::sync::{Arc, Once, Weak};

static INSTALL: Once = Once::new();
static TARGET: Mutex<Option<Weak<Shared>>> = Mutex::new(None);

/// Routes otherwise-unhandled panics to `logger` at ERROR with `unexpected: true`.
///
/// The process hook is installed once; later calls only retarget it to the
/// newest logger. The previously installed hook still runs afterwards, and the
/// hook never terminates the process itself.
pub(crate) fn install(logger: &Logger) {
    *TARGET.lock() = Some(Arc::downgrade(&logger.shared));

    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let shared = TARGET.lock().as_ref().and_then(Weak::upgrade);

            if let Some(shared) = shared {
                let message = info
                    .payload()
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| info.payload().downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic with non-string payload".to_string());

                let mut data = Payload::object().with("unexpected", true);
                if let Some(location) = info.location() {
                    data = data.with("location", location.to_string());
                }

                Logger { shared }.error(message, &[LogArg::Data(data)]);
            }

            previous(info);
        }));
    });
}
