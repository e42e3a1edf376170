//! Bidirectional token <-> id dictionary used to name label classes.
use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphabetState {
    Open,
    Sealed
}

/// Ids come from a counter that only moves forward, so an id is never handed out twice.  Once
/// sealed, lookups of known tokens still work but no new token can be inserted.
#[derive(Clone, Debug)]
pub struct Alphabet {
    token_to_id: HashMap<Arc<str>, i64>,
    id_to_token: HashMap<i64, Arc<str>>,
    next_id: i64,
    state: AlphabetState
}

impl Alphabet {
    pub fn new() -> Self {
        Alphabet {
            token_to_id: HashMap::new(),
            id_to_token: HashMap::new(),
            next_id: 0,
            state: AlphabetState::Open
        }
    }

    /// Builds a sealed alphabet, assigning ids in order.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let mut alphabet = Alphabet::new();
        for token in tokens.iter() {
            alphabet.add(token.as_ref())?;
        }
        alphabet.seal();
        Ok(alphabet)
    }

    /// Returns the id of `token`, allocating one if the alphabet is still open.
    pub fn get(&mut self, token: &str) -> Result<i64> {
        if let Some(id) = self.get_id(token) {
            return Ok(id)
        }

        if self.state == AlphabetState::Sealed {
            return Err(Error::AlphabetSealed(token.to_string()))
        }

        let id = self.next_id;
        let token: Arc<str> = Arc::from(token);
        self.token_to_id.insert(token.clone(), id);
        self.id_to_token.insert(id, token);
        self.next_id = (self.next_id + 1).max(self.id_to_token.len() as i64);
        Ok(id)
    }

    /// Like `get`, but the token must be new.
    pub fn add(&mut self, token: &str) -> Result<i64> {
        if self.state == AlphabetState::Sealed {
            return Err(Error::AlphabetSealed(token.to_string()))
        }
        if self.token_to_id.contains_key(token) {
            return Err(Error::DuplicateToken(token.to_string()))
        }
        self.get(token)
    }

    /// Lookup without insertion.
    pub fn get_id(&self, token: &str) -> Option<i64> {
        self.token_to_id.get(token).copied()
    }

    pub fn get_token(&self, id: i64) -> Option<&str> {
        self.id_to_token.get(&id).map(|t| &**t)
    }

    pub fn seal(&mut self) {
        self.state = AlphabetState::Sealed;
    }

    pub fn is_sealed(&self) -> bool {
        self.state == AlphabetState::Sealed
    }

    pub fn state(&self) -> AlphabetState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    /// Tokens in id order.
    pub fn iter(&self) -> impl Iterator<Item=(i64, &str)> {
        let mut ids: Vec<_> = self.id_to_token.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(move |id| self.get_token(id).map(|t| (id, t)))
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Alphabet::new()
    }
}
