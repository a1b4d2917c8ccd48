/// Cheap, synchronous presence check for an externally provided capability.
///
/// The loader never fetches or injects the capability; it only asks whether
/// somebody else already made it available.
pub trait Probe: Send + Sync + 'static {
    fn is_available(&self) -> bool;
}

impl<F> Probe for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn is_available(&self) -> bool {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::Probe;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn closures_are_probes() {
        let flag = Arc::new(AtomicBool::new(false));
        let probe = {
            let flag = flag.clone();
            move || flag.load(Ordering::SeqCst)
        };
        assert!(!probe.is_available());
        flag.store(true, Ordering::SeqCst);
        assert!(probe.is_available());
    }
}
