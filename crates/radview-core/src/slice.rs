use serde::{Deserialize, Serialize};

/// Named starting position within a slice list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlicePreset {
    First,
    Middle,
    Last,
}

/// Resolve the starting slice for a list of `number_of_slices` images.
///
/// An explicit `index` wins and is clamped to the last slice. Otherwise the
/// preset applies; with neither, the first slice is used.
pub fn compute_initial_index(
    number_of_slices: usize,
    index: Option<usize>,
    preset: Option<SlicePreset>,
) -> usize {
    if number_of_slices == 0 {
        return 0;
    }
    let last = number_of_slices - 1;

    if let Some(index) = index {
        return index.min(last);
    }

    match preset {
        Some(SlicePreset::First) | None => 0,
        Some(SlicePreset::Last) => last,
        Some(SlicePreset::Middle) => {
            // Even-length lists round toward the lower half.
            if number_of_slices % 2 == 0 {
                last / 2
            } else {
                (last + 1) / 2
            }
        }
    }
}
