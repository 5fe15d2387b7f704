use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bme280::BME280;
use config::Config;
use error::Result;
use transport::Bus;

type Table<B> = Arc<Mutex<HashMap<String, Weak<Entry<B>>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct Entry<B: Bus> {
    path: String,
    table: Table<B>,
    /// Live `SessionHandle`s. Only changed with `table` locked.
    handles: AtomicUsize,
    session: Mutex<BME280<B>>,
}

/// Shared reference to the one session of a bus path.
///
/// The session closes once every handle is gone. Its mutex is the lock that
/// keeps multi-byte register reads from different threads apart.
pub struct SessionHandle<B: Bus> {
    entry: Arc<Entry<B>>,
}

impl<B: Bus> SessionHandle<B> {
    /// Counts a new handle on `entry`; the caller holds the table lock.
    fn attach(entry: Arc<Entry<B>>) -> SessionHandle<B> {
        entry.handles.fetch_add(1, Ordering::Relaxed);
        SessionHandle { entry: entry }
    }

    pub fn lock(&self) -> MutexGuard<BME280<B>> {
        lock(&self.entry.session)
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }

    pub fn same_session(&self, other: &SessionHandle<B>) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

impl<B: Bus> Clone for SessionHandle<B> {
    fn clone(&self) -> SessionHandle<B> {
        let _table = lock(&self.entry.table);
        SessionHandle::attach(self.entry.clone())
    }
}

impl<B: Bus> Drop for SessionHandle<B> {
    fn drop(&mut self) {
        let entry = &self.entry;
        let mut table = lock(&entry.table);
        if entry.handles.fetch_sub(1, Ordering::Relaxed) != 1 {
            return;
        }
        // Last handle. The bus handle is closed before the table is unlocked,
        // so an acquire of the same path cannot open a second one meanwhile.
        if let Err(e) = lock(&entry.session).close() {
            warn!(
                "failed to close {} on last release, its bus handle may still be open: {}",
                entry.path, e
            );
        }
        let registered = match table.get(&entry.path) {
            Some(weak) => weak.as_ptr() == Arc::as_ptr(entry),
            None => false,
        };
        if registered {
            table.remove(&entry.path);
        }
        debug!("released {}", entry.path);
    }
}

/// Maps bus paths to their live session without owning it.
pub struct Registry<B: Bus> {
    bus: B,
    table: Table<B>,
}

impl<B: Bus + Clone> Registry<B> {
    pub fn new(bus: B) -> Registry<B> {
        Registry {
            bus: bus,
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the session for `path`, opening, identifying, calibrating and
    /// configuring it if it is not open yet.
    ///
    /// An already-open session is returned as is: `address` and `config` only
    /// apply to the acquisition that opens it. Use `BME280::configure` to
    /// change the configuration of an open session.
    pub fn acquire(&self, path: &str, address: u16, config: Config) -> Result<SessionHandle<B>> {
        let handle = {
            let mut table = lock(&self.table);
            let existing = table.get(path).and_then(|weak| weak.upgrade());
            match existing {
                Some(entry) => SessionHandle::attach(entry),
                None => {
                    let entry = Arc::new(Entry {
                        path: path.to_string(),
                        table: self.table.clone(),
                        handles: AtomicUsize::new(0),
                        session: Mutex::new(BME280::new(self.bus.clone(), path, address, config)),
                    });
                    table.insert(path.to_string(), Arc::downgrade(&entry));
                    SessionHandle::attach(entry)
                }
            }
        };
        // The table lock is released here: a failed activation drops the
        // handle, and dropping the last handle needs the table.
        {
            let mut session = handle.lock();
            session.activate(config)?;
        }
        Ok(handle)
    }

    pub fn contains(&self, path: &str) -> bool {
        lock(&self.table)
            .get(path)
            .map_or(false, |weak| weak.strong_count() > 0)
    }

    pub fn live_sessions(&self) -> usize {
        lock(&self.table)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bme280::tests::sample_bus;
    use bme280::DEFAULT_ADDRESS;
    use config::Mode;
    use error::Error;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_path_shares_one_session() {
        let bus = sample_bus();
        let registry = Registry::new(bus.clone());
        let a = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        let b = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        assert!(a.same_session(&b));
        assert_eq!(registry.live_sessions(), 1);
        bus.with(|r| {
            assert_eq!(r.opens, 1);
            assert_eq!(r.writes_to(0xE0), 1);
            assert_eq!(r.writes_to(0xF4), 1);
        });
    }

    #[test]
    fn second_acquire_ignores_new_address_and_config() {
        let bus = sample_bus();
        let registry = Registry::new(bus.clone());
        let a = registry.acquire("/dev/i2c-1", 0x77, Config::default()).unwrap();
        let forced = Config {
            mode: Mode::Forced,
            ..Config::default()
        };
        let b = registry.acquire("/dev/i2c-1", 0x76, forced).unwrap();
        assert!(a.same_session(&b));
        assert_eq!(b.lock().address(), 0x77);
        assert_eq!(b.lock().config(), Config::default());
        bus.with(|r| assert_eq!(r.address, Some(0x77)));
    }

    #[test]
    fn different_paths_get_different_sessions() {
        let bus = sample_bus();
        let registry = Registry::new(bus.clone());
        let a = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        let b = registry.acquire("/dev/i2c-2", DEFAULT_ADDRESS, Config::default()).unwrap();
        assert!(!a.same_session(&b));
        assert_eq!(registry.live_sessions(), 2);
        bus.with(|r| assert_eq!(r.opens, 2));
    }

    #[test]
    fn last_release_closes_and_prunes() {
        let bus = sample_bus();
        let registry = Registry::new(bus.clone());
        let a = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        let b = a.clone();
        drop(a);
        assert!(registry.contains("/dev/i2c-1"));
        bus.with(|r| assert_eq!(r.closes, 0));
        drop(b);
        assert!(!registry.contains("/dev/i2c-1"));
        assert!(lock(&registry.table).is_empty());
        bus.with(|r| assert_eq!(r.closes, 1));

        // A later acquire opens and calibrates afresh.
        let c = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        assert!(c.lock().was_calibrated());
        bus.with(|r| {
            assert_eq!(r.opens, 2);
            assert_eq!(r.writes_to(0xE0), 2);
        });
    }

    #[test]
    fn failed_activation_leaves_no_entry() {
        let bus = sample_bus();
        bus.with(|r| r.regs[0xD0] = 0x58);
        let registry = Registry::new(bus.clone());
        match registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()) {
            Err(Error::Protocol { .. }) => {}
            Err(e) => panic!("expected protocol error, got {}", e),
            Ok(_) => panic!("expected protocol error"),
        }
        assert_eq!(registry.live_sessions(), 0);
        assert!(lock(&registry.table).is_empty());
    }

    #[test]
    fn handles_read_through_the_shared_session() {
        let bus = sample_bus();
        let registry = Registry::new(bus.clone());
        let a = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        let b = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        assert_eq!(a.lock().qfe_pressure().unwrap(), 100653);
        assert!((b.lock().temperature().unwrap() - 25.08).abs() < 1e-6);
        assert_eq!(a.path(), "/dev/i2c-1");
    }

    #[test]
    fn release_and_reacquire_never_overlap() {
        let bus = sample_bus();
        bus.with(|r| r.close_delay = Some(Duration::from_millis(300)));
        let registry = Registry::new(bus.clone());
        let a = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();

        // The last release is still closing the bus handle when the path is
        // acquired again from this thread.
        let releaser = thread::spawn(move || drop(a));
        while registry.table.try_lock().is_ok() {
            thread::sleep(Duration::from_millis(1));
        }
        let b = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        releaser.join().unwrap();

        assert!(b.lock().opened());
        assert_eq!(registry.live_sessions(), 1);
        bus.with(|r| {
            assert_eq!(r.opens, 2);
            assert_eq!(r.closes, 1);
            assert_eq!(r.max_open, 1);
        });
    }

    #[test]
    fn clones_released_from_many_threads_close_once() {
        let bus = sample_bus();
        let registry = Registry::new(bus.clone());
        let a = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let handle = a.clone();
                thread::spawn(move || drop(handle))
            })
            .collect();
        drop(a);
        for worker in workers {
            worker.join().unwrap();
        }
        assert!(!registry.contains("/dev/i2c-1"));
        bus.with(|r| {
            assert_eq!(r.closes, 1);
            assert_eq!(r.open_now, 0);
        });
    }

    #[test]
    fn failed_close_on_last_release_still_prunes() {
        let bus = sample_bus();
        let registry = Registry::new(bus.clone());
        let a = registry.acquire("/dev/i2c-1", DEFAULT_ADDRESS, Config::default()).unwrap();
        bus.with(|r| r.fail_close = true);
        drop(a);
        assert!(!registry.contains("/dev/i2c-1"));
        assert!(lock(&registry.table).is_empty());
        bus.with(|r| {
            assert_eq!(r.closes, 0);
            assert_eq!(r.open_now, 1);
        });
    }
}
