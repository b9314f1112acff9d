//! macOS `Fn`-key specialization: monitors the modifier-flags-changed
//! event stream via a `CGEventTap` and emits only on actual transitions.
//! On every other platform, the listener never arms.

use crossbeam_channel::{unbounded, Receiver};

#[cfg(target_os = "macos")]
mod imp {
    use super::*;
    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
        CGEventTapPlacement, CGEventType,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    pub struct FnMonitor {
        stop_flag: Arc<AtomicBool>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl FnMonitor {
        pub fn new() -> Self {
            Self {
                stop_flag: Arc::new(AtomicBool::new(false)),
                handle: None,
            }
        }

        /// Start watching `FlagsChanged` events for the secondary-Fn flag.
        /// Returns `None` if the event tap could not be created (commonly:
        /// Accessibility permission not granted).
        pub fn start(&mut self) -> Option<Receiver<bool>> {
            self.stop();

            let (tx, rx) = unbounded::<bool>();
            let stop_flag = Arc::new(AtomicBool::new(false));
            self.stop_flag = stop_flag.clone();

            let last_state = Arc::new(AtomicBool::new(false));
            let last_state_cb = last_state.clone();
            let stop_flag_cb = stop_flag.clone();

            let callback = move |_proxy, event_type: CGEventType, event: &CGEvent| {
                if stop_flag_cb.load(Ordering::SeqCst) {
                    CFRunLoop::get_current().stop();
                    return Some(event.clone());
                }
                if event_type == CGEventType::FlagsChanged {
                    let pressed = event.get_flags().contains(CGEventFlags::CGEventFlagSecondaryFn);
                    let was_pressed = last_state_cb.load(Ordering::SeqCst);
                    if pressed != was_pressed {
                        last_state_cb.store(pressed, Ordering::SeqCst);
                        let _ = tx.send(pressed);
                    }
                }
                Some(event.clone())
            };

            let tap = CGEventTap::new(
                CGEventTapLocation::Session,
                CGEventTapPlacement::HeadInsertEventTap,
                CGEventTapOptions::ListenOnly,
                vec![CGEventType::FlagsChanged],
                callback,
            )
            .ok()?;

            tap.enable();
            let run_loop_source = tap.mach_port.create_runloop_source(0).ok()?;

            let thread_stop_flag = stop_flag.clone();
            let handle = thread::spawn(move || {
                let run_loop = CFRunLoop::get_current();
                run_loop.add_source(&run_loop_source, unsafe { kCFRunLoopCommonModes });
                while !thread_stop_flag.load(Ordering::SeqCst) {
                    CFRunLoop::run_in_mode(
                        unsafe { kCFRunLoopDefaultMode },
                        Duration::from_millis(100),
                        true,
                    );
                }
            });

            self.handle = Some(handle);
            Some(rx)
        }

        pub fn stop(&mut self) {
            self.stop_flag.store(true, Ordering::SeqCst);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    impl Default for FnMonitor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for FnMonitor {
        fn drop(&mut self) {
            self.stop();
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod imp {
    use super::*;

    pub struct FnMonitor;

    impl FnMonitor {
        pub fn new() -> Self {
            Self
        }

        /// Never arms outside macOS; callers should report
        /// `HotkeyInactive("fn-requires-macos")`.
        pub fn start(&mut self) -> Option<Receiver<bool>> {
            None
        }

        pub fn stop(&mut self) {}
    }

    impl Default for FnMonitor {
        fn default() -> Self {
            Self::new()
        }
    }
}

pub use imp::FnMonitor;

/// Returns `true` when `Fn`-binding monitoring is supported on this host.
pub fn fn_monitoring_supported() -> bool {
    cfg!(target_os = "macos")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_support_matching_platform() {
        assert_eq!(fn_monitoring_supported(), cfg!(target_os = "macos"));
    }

    #[test]
    #[cfg(not(target_os = "macos"))]
    fn non_macos_monitor_never_arms() {
        let mut monitor = FnMonitor::new();
        assert!(monitor.start().is_none());
    }
}
