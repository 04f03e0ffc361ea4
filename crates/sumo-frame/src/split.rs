use bytes::Bytes;

use crate::codec::Header;
use crate::error::Result;

/// One frame cut out of a datagram, header already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: Header,
    /// Exactly `header.size` bytes, header included.
    pub bytes: Bytes,
}

/// Iterator over the frames packed into one datagram.
///
/// Frames are cut using the header's size field, in wire order. The first
/// malformed header (including a size running past the datagram) is yielded
/// as an error and ends the iteration: whatever follows it cannot be located.
pub struct DatagramFrames {
    datagram: Bytes,
    offset: usize,
    done: bool,
}

/// Split `datagram` into frames without copying.
pub fn split_datagram(datagram: Bytes) -> DatagramFrames {
    DatagramFrames {
        datagram,
        offset: 0,
        done: false,
    }
}

impl DatagramFrames {
    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.datagram.len() - self.offset
    }
}

impl Iterator for DatagramFrames {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.datagram.len() {
            return None;
        }

        match Header::decode(&self.datagram[self.offset..]) {
            Ok(header) => {
                let end = self.offset + header.size as usize;
                let bytes = self.datagram.slice(self.offset..end);
                self.offset = end;
                Some(Ok(RawFrame { header, bytes }))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for DatagramFrames {}
