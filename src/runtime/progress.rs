//! Progress reporting over the endpoint list.

use tracing::info;

/// Number of progress log lines over a full run.
const STEPS: usize = 10;

/// Iterator adapter that logs how many lines have been consumed.
pub struct Progress<I> {
    inner: I,
    position: usize,
    total: usize,
    next_report: usize,
}

impl<I: Iterator> Progress<I> {
    pub fn new(inner: I, total: usize) -> Self {
        let mut progress = Progress {
            inner,
            position: 0,
            total,
            next_report: 0,
        };
        progress.next_report = progress.step_after(0);
        progress
    }

    /// First position past `position` at which to report.
    fn step_after(&self, position: usize) -> usize {
        let step = (self.total / STEPS).max(1);
        (position / step + 1) * step
    }
}

impl<I: Iterator> Iterator for Progress<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        self.position += 1;
        if self.position >= self.next_report || self.position == self.total {
            info!(position = self.position, total = self.total, "Progress");
            self.next_report = self.step_after(self.position);
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{count_endpoints, endpoint_lines};

    #[test]
    fn test_passes_items_through() {
        let items: Vec<_> = Progress::new(1..=5, 5).collect();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_position_ends_at_total() {
        let list = "1.1.1.1:80\n\n2.2.2.2:80\n   \nbroken\n\n";
        let total = count_endpoints(list);
        let mut progress = Progress::new(endpoint_lines(list), total);

        while progress.next().is_some() {
            assert!(progress.position <= progress.total);
        }
        assert_eq!(progress.position, 3);
        assert_eq!(progress.position, total);
    }

    #[test]
    fn test_report_steps() {
        let progress = Progress::new(0..100, 100);
        assert_eq!(progress.next_report, 10);
        assert_eq!(progress.step_after(10), 20);
        assert_eq!(progress.step_after(15), 20);

        let small = Progress::new(0..3, 3);
        assert_eq!(small.next_report, 1);
        assert_eq!(small.step_after(1), 2);
    }
}
