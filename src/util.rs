use crate::math::{T, TV};
use std::ops::Range;

/// `num` evenly spaced samples from `start` to `end`, both included.
pub fn linspace(start: T, end: T, num: usize) -> impl Iterator<Item = T> {
    let step = if num > 1 {
        (end - start) / (num - 1) as T
    } else {
        0.
    };
    (0..num).map(move |i| start + step * i as T)
}

pub trait RangeExt {
    fn size(&self) -> TV;

    fn center(&self) -> TV;

    fn volume(&self) -> T;

    fn contains_point(&self, x: &TV) -> bool;

    fn thickened(&self, amount: T) -> Self;
}

impl RangeExt for Range<TV> {
    fn size(&self) -> TV {
        self.end - self.start
    }

    fn center(&self) -> TV {
        0.5 * (self.start + self.end)
    }

    fn volume(&self) -> T {
        self.size().iter().product()
    }

    fn contains_point(&self, x: &TV) -> bool {
        self.start.all_lt(x) && self.end.all_gt(x)
    }

    fn thickened(&self, amount: T) -> Self {
        self.start - TV::from_element(amount)..self.end + TV::from_element(amount)
    }
}

pub trait VecExt {
    fn all_lt(&self, other: &Self) -> bool;

    fn all_gt(&self, other: &Self) -> bool;

    fn component_min(&self, other: &Self) -> Self;

    fn component_max(&self, other: &Self) -> Self;
}

impl VecExt for TV {
    fn all_lt(&self, other: &Self) -> bool {
        self.iter().zip(other.iter()).all(|(a, b)| a < b)
    }

    fn all_gt(&self, other: &Self) -> bool {
        self.iter().zip(other.iter()).all(|(a, b)| a > b)
    }

    fn component_min(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.min(b))
    }

    fn component_max(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.max(b))
    }
}
