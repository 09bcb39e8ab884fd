//! Hex rendering of raw packets for trace logging.

/// Renders a byte slice as space-separated hex pairs.
///
/// Implements [`core::fmt::Display`] and, with the `defmt` feature,
/// `defmt::Format`, so it can be handed to either logger.
#[derive(Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl core::fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for HexDump<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HexDump<'_> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=[u8]:02x}", self.0)
    }
}
