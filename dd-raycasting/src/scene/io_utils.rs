use cad_import::structure::PrimitiveType;

/// Turns a stream of vertex indices into triangles for indexed triangle lists, fans and strips.
/// The triangles of strips are emitted with a consistent winding.
pub struct TriangleIterator<I: Iterator<Item = u32>> {
    primitive: PrimitiveType,
    indices: I,

    /// The previously consumed indices of fans and strips.
    pending: [u32; 2],

    /// Every second triangle of a strip has its first two vertices swapped.
    odd: bool,
}

impl<I: Iterator<Item = u32>> TriangleIterator<I> {
    /// Creates a new triangle iterator. Returns `None` for primitive types that do not describe
    /// triangles.
    ///
    /// # Arguments
    /// * `primitive` - The primitive type of the index stream.
    /// * `indices` - The vertex indices.
    pub fn new(primitive: PrimitiveType, mut indices: I) -> Option<Self> {
        let pending = match primitive {
            PrimitiveType::Triangles => [0, 0],
            PrimitiveType::TriangleFan | PrimitiveType::TriangleStrip => {
                let first = indices.next()?;
                let second = indices.next()?;
                [first, second]
            }
            _ => return None,
        };

        Some(Self {
            primitive,
            indices,
            pending,
            odd: false,
        })
    }
}

impl<I: Iterator<Item = u32>> Iterator for TriangleIterator<I> {
    type Item = [u32; 3];

    fn next(&mut self) -> Option<Self::Item> {
        match self.primitive {
            PrimitiveType::Triangles => {
                let v0 = self.indices.next()?;
                let v1 = self.indices.next()?;
                let v2 = self.indices.next()?;

                Some([v0, v1, v2])
            }
            PrimitiveType::TriangleFan => {
                let v2 = self.indices.next()?;
                let [v0, v1] = self.pending;
                self.pending[1] = v2;

                Some([v0, v1, v2])
            }
            PrimitiveType::TriangleStrip => {
                let v2 = self.indices.next()?;
                let [a, b] = self.pending;
                self.pending = [b, v2];

                let triangle = if self.odd { [b, a, v2] } else { [a, b, v2] };
                self.odd = !self.odd;

                Some(triangle)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn collect(primitive: PrimitiveType, indices: Vec<u32>) -> Option<Vec<[u32; 3]>> {
        TriangleIterator::new(primitive, indices.into_iter()).map(|it| it.collect())
    }

    #[test]
    fn test_triangle_list() {
        assert_eq!(
            collect(PrimitiveType::Triangles, vec![0, 1, 2, 3, 4, 5, 6]),
            Some(vec![[0, 1, 2], [3, 4, 5]])
        );
    }

    #[test]
    fn test_triangle_fan() {
        assert_eq!(
            collect(PrimitiveType::TriangleFan, vec![0, 1, 2, 3, 4]),
            Some(vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]])
        );
    }

    #[test]
    fn test_triangle_strip_keeps_winding() {
        assert_eq!(
            collect(PrimitiveType::TriangleStrip, vec![0, 1, 2, 3, 4]),
            Some(vec![[0, 1, 2], [2, 1, 3], [2, 3, 4]])
        );
    }

    #[test]
    fn test_short_streams() {
        assert_eq!(collect(PrimitiveType::TriangleStrip, vec![0]), None);
        assert_eq!(collect(PrimitiveType::TriangleFan, vec![0, 1]), Some(vec![]));
        assert_eq!(collect(PrimitiveType::Triangles, vec![0, 1]), Some(vec![]));
    }
}
