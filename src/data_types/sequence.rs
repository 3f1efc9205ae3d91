
/// Errors that can occur while building a sequence from raw input
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SequenceError {
    #[error("sequence {id:?} is empty")]
    Empty { id: String },
    #[error("sequence {id:?} contains invalid symbol {symbol:?} at position {position}")]
    InvalidSymbol { id: String, symbol: char, position: usize },
    #[error("unable to allocate {length} bases for sequence {id:?}")]
    AllocationFailed { id: String, length: usize }
}

/// Returns true if the provided (uppercase) symbol is a nucleotide or IUPAC ambiguity code
pub fn is_valid_symbol(symbol: u8) -> bool {
    matches!(symbol,
        b'A' | b'C' | b'G' | b'T' | b'N' |
        b'R' | b'Y' | b'S' | b'W' | b'K' | b'M' |
        b'B' | b'D' | b'H' | b'V'
    )
}

/// Returns true if the symbol is one of the four unambiguous bases
pub fn is_unambiguous(symbol: u8) -> bool {
    matches!(symbol, b'A' | b'C' | b'G' | b'T')
}

/// Complement for a single IUPAC symbol; anything unknown maps to N
pub fn complement(symbol: u8) -> u8 {
    match symbol {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        b'S' => b'S',
        b'W' => b'W',
        _ => b'N'
    }
}

/// Returns the reverse complement of a sequence.
/// For any valid IUPAC input, applying this twice returns the original bytes.
/// # Arguments
/// * `seq` - the sequence to reverse complement
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev()
        .map(|&c| complement(c))
        .collect()
}

/// A nucleotide sequence with an identity.
/// Bases are always stored uppercase and restricted to the IUPAC alphabet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sequence {
    /// Identifier, usually the source candidate or file
    id: String,
    /// The bases
    bases: Vec<u8>,
    /// If true, the genome is circular and position 0 is the linearization breakpoint
    is_circular: bool
}

impl Sequence {
    /// Creates a new sequence, normalizing to uppercase.
    /// # Arguments
    /// * `id` - the identifier for the sequence
    /// * `raw` - the raw bases, any case
    /// * `is_circular` - circularity flag
    /// # Errors
    /// * if the sequence is empty
    /// * if there is a symbol outside the IUPAC alphabet
    /// * if we cannot allocate enough space for the sequence
    pub fn new(id: String, raw: &[u8], is_circular: bool) -> Result<Self, SequenceError> {
        if raw.is_empty() {
            return Err(SequenceError::Empty { id });
        }

        let mut bases: Vec<u8> = Vec::new();
        if bases.try_reserve_exact(raw.len()).is_err() {
            return Err(SequenceError::AllocationFailed { id, length: raw.len() });
        }

        for (position, &c) in raw.iter().enumerate() {
            let upper = c.to_ascii_uppercase();
            if !is_valid_symbol(upper) {
                return Err(SequenceError::InvalidSymbol { id, symbol: c as char, position });
            }
            bases.push(upper);
        }

        Ok(Self {
            id,
            bases,
            is_circular
        })
    }

    /// Replaces the bases while keeping the identity, used by the correction stages.
    /// The caller is responsible for only passing valid uppercase symbols.
    pub(crate) fn with_bases(&self, bases: Vec<u8>) -> Self {
        Self {
            id: self.id.clone(),
            bases,
            is_circular: self.is_circular
        }
    }

    // getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn is_circular(&self) -> bool {
        self.is_circular
    }
}
