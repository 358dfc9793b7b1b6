use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag polled by extractors between pages and before
/// opening a document. Cloning shares the flag; a child observes every ancestor.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancelling the child does not touch the parent.
    pub fn child_token(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.flag.load(Ordering::SeqCst) {
                return true;
            }
            current = token.parent.as_deref();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;

    #[test]
    fn child_observes_parent_but_not_the_reverse() {
        let parent = CancellationToken::new();
        let child = parent.child_token();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn grandchild_observes_root_cancellation() {
        let root = CancellationToken::new();
        let request = root.child_token();
        let extraction = request.child_token();
        assert!(!extraction.is_cancelled());

        root.cancel();
        assert!(request.is_cancelled());
        assert!(extraction.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
