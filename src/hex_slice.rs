use std::fmt::{Formatter, UpperHex};

/// Wrapper to format byte slices as hexadecimal sequences in log output.
pub struct HexSlice<'a>(&'a [u8]);

impl<'a> HexSlice<'a> {
    /// Creates a new hex slice from anything that derefs into a byte slice.
    pub fn new<T>(slice: &'a T) -> Self
    where
        T: AsRef<[u8]> + ?Sized,
    {
        Self(slice.as_ref())
    }
}

impl UpperHex for HexSlice<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;

        for (index, byte) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }

            write!(f, "{byte:#04X}")?;
        }

        write!(f, "]")
    }
}
