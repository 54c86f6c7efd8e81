use std::collections::HashMap;
use std::error;
use std::fmt;

/// A transfer ended without every block between 1 and its final block.
#[derive(Debug, PartialEq, Clone)]
pub struct IncompleteTransfer {
    /// The first block number that was never received.
    pub missing_block: u16,

    /// The block number of the terminal Data packet.
    pub final_block: u16,
}

impl error::Error for IncompleteTransfer {}

impl fmt::Display for IncompleteTransfer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Didn't get all the blocks! Block {} of {} is missing",
            self.missing_block, self.final_block
        )
    }
}

/// Concatenates blocks 1 through `final_block` in ascending order. Fails without producing any
/// output if a block in that range was never stored.
pub fn assemble(blocks: &HashMap<u16, Vec<u8>>, final_block: u16) -> Result<Vec<u8>, IncompleteTransfer> {
    let mut contents = Vec::new();
    for block in 1..=final_block {
        match blocks.get(&block) {
            Some(data) => contents.extend_from_slice(data),
            None => return Err(IncompleteTransfer { missing_block: block, final_block }),
        }
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(entries: &[(u16, &[u8])]) -> HashMap<u16, Vec<u8>> {
        entries.iter().map(|(k, v)| (*k, v.to_vec())).collect()
    }

    #[test]
    fn test_assemble_complete() {
        let m = blocks(&[(2, b"Second Blob"), (1, b"First blob")]);
        assert_eq!(assemble(&m, 2).unwrap(), b"First blobSecond Blob".to_vec());
    }

    #[test]
    fn test_assemble_missing_block() {
        let m = blocks(&[(1, b"First blob"), (3, b"Third Blob")]);
        assert_eq!(
            assemble(&m, 3),
            Err(IncompleteTransfer { missing_block: 2, final_block: 3 })
        );
    }

    #[test]
    fn test_assemble_missing_first_block() {
        let m = blocks(&[(2, b"b"), (3, b"c")]);
        assert_eq!(assemble(&m, 3).unwrap_err().missing_block, 1);
    }

    #[test]
    fn test_assemble_ignores_blocks_past_final() {
        let m = blocks(&[(1, b"a"), (2, b"b"), (7, b"stray")]);
        assert_eq!(assemble(&m, 2).unwrap(), b"ab".to_vec());
    }

    #[test]
    fn test_assemble_zero_final_block_is_empty() {
        assert_eq!(assemble(&HashMap::new(), 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_assemble_full_block_space() {
        let m: HashMap<u16, Vec<u8>> = (1..=u16::MAX).map(|b| (b, vec![(b % 251) as u8])).collect();
        let contents = assemble(&m, u16::MAX).unwrap();
        assert_eq!(contents.len(), u16::MAX as usize);
        assert_eq!(contents[0], 1);
        assert_eq!(contents[250], 0);
    }

    #[test]
    fn test_incomplete_transfer_display() {
        let err = IncompleteTransfer { missing_block: 2, final_block: 3 };
        assert_eq!(err.to_string(), "Didn't get all the blocks! Block 2 of 3 is missing");
    }
}
