use std::fmt::Display;

/// A 2D vector generic over any numeric type.
///
/// Used for pixel positions and surface sizes on the HUD.
///
/// # Type Parameters
/// * `T` - The functionality for the vector depends on traits implemented by `T`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
pub struct Vec2D<T> {
    /// The x-component of the vector.
    x: T,
    /// The y-component of the vector.
    y: T,
}

impl<T: Copy> Vec2D<T> {
    pub const fn new(x: T, y: T) -> Self { Self { x, y } }

    pub fn x(&self) -> T { self.x }

    pub fn y(&self) -> T { self.y }
}

impl<T: Display> Display for Vec2D<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}
