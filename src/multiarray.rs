//! Dense multi-dimensional arrays with 1-based indexing.
//!
//! Every variable family of the encoding (`mapping[v]`, `nodeType[c,k,p]`,
//! ...) is stored in a [`MultiArray`], indexed by an array of 1-based
//! coordinates: `vars.node_type[[c, k, p]]`.

use std::ops::{Index, IndexMut};

#[derive(Debug, Clone)]
pub struct MultiArray<T, const N: usize> {
    shape: [usize; N],
    data: Vec<T>,
}

impl<T, const N: usize> MultiArray<T, N> {
    /// Create a new array of the given shape, initializing every cell with
    /// `init(index)`. Cells are initialized in row-major order.
    pub fn new_with<F>(shape: [usize; N], mut init: F) -> Self
    where
        F: FnMut([usize; N]) -> T,
    {
        let size = shape.iter().product();
        let mut data = Vec::with_capacity(size);
        for offset in 0..size {
            data.push(init(Self::index_of(&shape, offset)));
        }
        Self { shape, data }
    }

    pub fn shape(&self) -> [usize; N] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All values in row-major order.
    pub fn values(&self) -> &[T] {
        &self.data
    }

    pub fn get(&self, index: [usize; N]) -> Option<&T> {
        let offset = self.checked_offset(index)?;
        Some(&self.data[offset])
    }

    /// Iterate over all indices in row-major order.
    pub fn indices(&self) -> impl Iterator<Item = [usize; N]> + '_ {
        (0..self.data.len()).map(|offset| Self::index_of(&self.shape, offset))
    }

    pub fn map<U, F>(&self, mut f: F) -> MultiArray<U, N>
    where
        F: FnMut(&T) -> U,
    {
        MultiArray {
            shape: self.shape,
            data: self.data.iter().map(|x| f(x)).collect(),
        }
    }

    fn checked_offset(&self, index: [usize; N]) -> Option<usize> {
        let mut offset = 0;
        for d in 0..N {
            let i = index[d];
            if i == 0 || i > self.shape[d] {
                return None;
            }
            offset = offset * self.shape[d] + (i - 1);
        }
        Some(offset)
    }

    fn offset(&self, index: [usize; N]) -> usize {
        match self.checked_offset(index) {
            Some(offset) => offset,
            None => panic!("Index {:?} is out of shape bounds {:?}", index, self.shape),
        }
    }

    fn index_of(shape: &[usize; N], mut offset: usize) -> [usize; N] {
        let mut index = [0; N];
        for d in (0..N).rev() {
            index[d] = offset % shape[d] + 1;
            offset /= shape[d];
        }
        index
    }
}

impl<T, const N: usize> Index<[usize; N]> for MultiArray<T, N> {
    type Output = T;

    fn index(&self, index: [usize; N]) -> &Self::Output {
        let offset = self.offset(index);
        &self.data[offset]
    }
}

impl<T, const N: usize> IndexMut<[usize; N]> for MultiArray<T, N> {
    fn index_mut(&mut self, index: [usize; N]) -> &mut Self::Output {
        let offset = self.offset(index);
        &mut self.data[offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_init() {
        let array = MultiArray::new_with([2, 3], |[i, j]| 10 * i + j);
        assert_eq!(array.values(), &[11, 12, 13, 21, 22, 23]);
        assert_eq!(array[[1, 1]], 11);
        assert_eq!(array[[2, 3]], 23);
    }

    #[test]
    fn test_get_out_of_bounds() {
        let array = MultiArray::new_with([2, 2], |_| 0);
        assert_eq!(array.get([0, 1]), None);
        assert_eq!(array.get([3, 1]), None);
        assert_eq!(array.get([2, 2]), Some(&0));
    }

    #[test]
    #[should_panic(expected = "out of shape bounds")]
    fn test_index_out_of_bounds() {
        let array = MultiArray::new_with([1], |_| 0);
        let _ = array[[2]];
    }

    #[test]
    fn test_index_mut_and_indices() {
        let mut array = MultiArray::new_with([2, 2, 2], |_| 0);
        array[[2, 1, 2]] = 42;
        let indices: Vec<_> = array.indices().collect();
        assert_eq!(indices.len(), 8);
        assert_eq!(indices[0], [1, 1, 1]);
        assert_eq!(indices[7], [2, 2, 2]);
        assert_eq!(array.get([2, 1, 2]), Some(&42));
    }

    #[test]
    fn test_empty_shape() {
        let mut calls = 0;
        let array = MultiArray::new_with([3, 0], |_| {
            calls += 1;
        });
        assert!(array.is_empty());
        assert_eq!(calls, 0);
    }
}
