//! Emotion label window and confidence vote
//!
//! Each detection cycle collects per-frame labels into a bounded window,
//! then resolves the window into a single emotion by majority share.
//! "sad" wins at a lower share than the other labels because it shows up
//! weakly in frame classifiers; everything below threshold falls back to
//! neutral.

use crate::emotion::{Emotion, NUM_EMOTIONS};
use std::collections::VecDeque;

/// Bounded window of frame labels, oldest evicted first
#[derive(Debug, Clone)]
pub struct DetectionWindow {
    labels: VecDeque<Emotion>,
    max_hits: usize,
}

impl DetectionWindow {
    pub fn new(max_hits: usize) -> Self {
        Self {
            labels: VecDeque::with_capacity(max_hits),
            max_hits,
        }
    }

    /// Append a label, evicting the oldest when the window is full
    pub fn push(&mut self, label: Emotion) {
        if self.labels.len() >= self.max_hits {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Resolve the window into a vote result
    ///
    /// The top label must hold at least `accept_share` of the window
    /// (`sad_share` when the top label is sad). Ties go to the label
    /// seen earliest in the window.
    pub fn resolve(&self, accept_share: f64, sad_share: f64) -> Resolution {
        if self.labels.is_empty() {
            return Resolution::EmptyWindow;
        }

        let mut counts = [0usize; NUM_EMOTIONS];
        let mut first_seen = [usize::MAX; NUM_EMOTIONS];
        for (position, &label) in self.labels.iter().enumerate() {
            let slot = label as usize;
            counts[slot] += 1;
            if first_seen[slot] == usize::MAX {
                first_seen[slot] = position;
            }
        }

        let mut top: Option<Emotion> = None;
        for &candidate in Emotion::ALL.iter() {
            let slot = candidate as usize;
            if counts[slot] == 0 {
                continue;
            }
            match top {
                None => top = Some(candidate),
                Some(current) => {
                    let held = current as usize;
                    let beats = counts[slot] > counts[held]
                        || (counts[slot] == counts[held] && first_seen[slot] < first_seen[held]);
                    if beats {
                        top = Some(candidate);
                    }
                }
            }
        }
        let Some(top) = top else {
            return Resolution::EmptyWindow;
        };

        let share = counts[top as usize] as f64 / self.labels.len() as f64;
        let threshold = if top == Emotion::Sad {
            sad_share
        } else {
            accept_share
        };
        if share >= threshold {
            Resolution::Confident { emotion: top, share }
        } else {
            Resolution::Unconfident { top, share }
        }
    }
}

/// Outcome of a window vote
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// No labels were collected this cycle
    EmptyWindow,
    /// The top label cleared its share threshold
    Confident { emotion: Emotion, share: f64 },
    /// A top label exists but fell below threshold
    Unconfident { top: Emotion, share: f64 },
}

impl Resolution {
    /// The emotion the cycle locks in; unconfident and empty windows
    /// resolve to neutral
    pub fn winner(&self) -> Emotion {
        match self {
            Resolution::Confident { emotion, .. } => *emotion,
            Resolution::EmptyWindow | Resolution::Unconfident { .. } => Emotion::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(labels: &[Emotion]) -> DetectionWindow {
        let mut window = DetectionWindow::new(40);
        for &label in labels {
            window.push(label);
        }
        window
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut window = DetectionWindow::new(3);
        window.push(Emotion::Angry);
        window.push(Emotion::Happy);
        window.push(Emotion::Happy);
        window.push(Emotion::Happy);
        assert_eq!(window.len(), 3);
        // the angry label fell off the front
        match window.resolve(0.4, 0.25) {
            Resolution::Confident { emotion, share } => {
                assert_eq!(emotion, Emotion::Happy);
                assert_eq!(share, 1.0);
            }
            other => panic!("expected confident happy, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_window_resolves_neutral() {
        let window = DetectionWindow::new(40);
        let resolution = window.resolve(0.4, 0.25);
        assert_eq!(resolution, Resolution::EmptyWindow);
        assert_eq!(resolution.winner(), Emotion::Neutral);
    }

    #[test]
    fn test_majority_share_accepted() {
        let window = window_of(&[
            Emotion::Happy,
            Emotion::Happy,
            Emotion::Neutral,
            Emotion::Happy,
            Emotion::Angry,
        ]);
        // happy holds 3/5 = 0.6
        assert_eq!(window.resolve(0.4, 0.25).winner(), Emotion::Happy);
    }

    #[test]
    fn test_below_threshold_falls_back_to_neutral() {
        let mut labels = vec![Emotion::Happy; 3];
        labels.extend(vec![Emotion::Angry; 3]);
        labels.extend(vec![Emotion::Neutral; 2]);
        labels.extend(vec![Emotion::Sad; 2]);
        let window = window_of(&labels);
        // top label holds 3/10 = 0.3, below 0.4
        let resolution = window.resolve(0.4, 0.25);
        assert!(matches!(resolution, Resolution::Unconfident { .. }));
        assert_eq!(resolution.winner(), Emotion::Neutral);
    }

    #[test]
    fn test_sad_wins_at_lowered_share() {
        let mut labels = vec![Emotion::Sad; 3];
        labels.extend(vec![Emotion::Neutral; 2]);
        labels.extend(vec![Emotion::Happy; 2]);
        labels.extend(vec![Emotion::Angry; 2]);
        labels.push(Emotion::Neutral);
        let window = window_of(&labels);
        // sad holds 3/10 = 0.3: below the 0.4 general threshold but
        // above the 0.25 sad threshold
        assert_eq!(window.resolve(0.4, 0.25).winner(), Emotion::Sad);
    }

    #[test]
    fn test_same_share_not_sad_rejected() {
        let mut labels = vec![Emotion::Happy; 3];
        labels.extend(vec![Emotion::Neutral; 3]);
        labels.extend(vec![Emotion::Angry; 2]);
        labels.extend(vec![Emotion::Sad; 2]);
        let window = window_of(&labels);
        // happy also holds 3/10 but only gets the 0.4 threshold
        assert_eq!(window.resolve(0.4, 0.25).winner(), Emotion::Neutral);
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let window = window_of(&[
            Emotion::Neutral,
            Emotion::Happy,
            Emotion::Happy,
            Emotion::Neutral,
        ]);
        // 2-2 tie; neutral appeared first
        assert_eq!(window.resolve(0.4, 0.25).winner(), Emotion::Neutral);

        let window = window_of(&[
            Emotion::Happy,
            Emotion::Neutral,
            Emotion::Neutral,
            Emotion::Happy,
        ]);
        assert_eq!(window.resolve(0.4, 0.25).winner(), Emotion::Happy);
    }

    #[test]
    fn test_clear_resets_window() {
        let mut window = window_of(&[Emotion::Happy, Emotion::Happy]);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.resolve(0.4, 0.25), Resolution::EmptyWindow);
    }
}
