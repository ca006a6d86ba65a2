use crate::error::BuildError;

/// Little-endian byte writer for component records and expression chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataBuffer {
    bytes: Vec<u8>,
}

impl DataBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Overwrites two bytes at `offset`; used to patch jump targets.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        if let Some(slot) = self.bytes.get_mut(offset..offset + 2) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Cursor over a buffer written by `DataBuffer`.
#[derive(Debug, Clone)]
pub struct DataReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> DataReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    fn take<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], BuildError> {
        let end = self.position + N;
        let slice = self
            .bytes
            .get(self.position..end)
            .ok_or(BuildError::UnexpectedEof(what))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.position = end;
        Ok(out)
    }

    pub fn read_u8(&mut self, what: &'static str) -> Result<u8, BuildError> {
        Ok(self.take::<1>(what)?[0])
    }

    pub fn read_u16(&mut self, what: &'static str) -> Result<u16, BuildError> {
        Ok(u16::from_le_bytes(self.take(what)?))
    }

    pub fn read_i16(&mut self, what: &'static str) -> Result<i16, BuildError> {
        Ok(i16::from_le_bytes(self.take(what)?))
    }

    pub fn read_i32(&mut self, what: &'static str) -> Result<i32, BuildError> {
        Ok(i32::from_le_bytes(self.take(what)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_little_endian_and_patches() {
        let mut buffer = DataBuffer::new();
        buffer.write_u8(7);
        buffer.write_u16(0);
        buffer.write_i16(-1);
        buffer.patch_u16(1, 0x0102);
        assert_eq!(buffer.as_slice(), &[7, 0x02, 0x01, 0xff, 0xff]);

        let mut reader = DataReader::new(buffer.as_slice());
        assert_eq!(reader.read_u8("tag").unwrap(), 7);
        assert_eq!(reader.read_u16("jump").unwrap(), 0x0102);
        assert_eq!(reader.read_i16("flow").unwrap(), -1);
        assert!(reader.is_at_end());
        assert!(matches!(
            reader.read_i32("count"),
            Err(BuildError::UnexpectedEof("count"))
        ));
    }
}
