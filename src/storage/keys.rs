//! Storage keys
//!
//! A key is one data type byte followed by the name. Session-scoped types
//! prefix the name with `<session>.`; translatable types may carry a
//! `_<language>` suffix.

use std::fmt;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Compiled node code
    Bin = 1,
    /// Menu label translations
    Menu = 2,
    /// Node display templates
    Template = 4,
    /// Static content served to LOAD
    StaticLoad = 8,
    /// Persisted navigation state
    State = 16,
    /// Application data kept per session
    UserData = 32,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::Bin,
        DataType::Menu,
        DataType::Template,
        DataType::StaticLoad,
        DataType::State,
        DataType::UserData,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<DataType> {
        match code {
            1 => Some(DataType::Bin),
            2 => Some(DataType::Menu),
            4 => Some(DataType::Template),
            8 => Some(DataType::StaticLoad),
            16 => Some(DataType::State),
            32 => Some(DataType::UserData),
            _ => None,
        }
    }

    /// Types stored per session
    pub fn is_sessioned(self) -> bool {
        self.code() > DataType::StaticLoad.code()
    }

    /// Types that may have language variants
    pub fn is_translatable(self) -> bool {
        matches!(self, DataType::Menu | DataType::Template | DataType::StaticLoad)
    }

    /// Types a deployment normally seals read-only
    pub fn is_content(self) -> bool {
        !self.is_sessioned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub data_type: DataType,
    pub name: String,
    pub session: Option<String>,
    pub language: Option<String>,
}

impl StorageKey {
    pub fn new(data_type: DataType, name: &str) -> Self {
        Self {
            data_type,
            name: name.to_string(),
            session: None,
            language: None,
        }
    }

    pub fn with_session(mut self, session: &str) -> Self {
        if !session.is_empty() {
            self.session = Some(session.to_string());
        }
        self
    }

    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.language = language.filter(|l| !l.is_empty()).map(str::to_string);
        self
    }

    /// The same key without its language variant
    pub fn untranslated(&self) -> StorageKey {
        StorageKey {
            language: None,
            ..self.clone()
        }
    }

    /// Keys to try on lookup, most specific first
    pub fn candidates(&self) -> Vec<StorageKey> {
        if self.language.is_some() && self.data_type.is_translatable() {
            vec![self.clone(), self.untranslated()]
        } else {
            vec![self.untranslated()]
        }
    }

    /// Name with session prefix and language suffix applied
    pub fn scoped_name(&self) -> String {
        let mut name = match &self.session {
            Some(session) if self.data_type.is_sessioned() => format!("{}.{}", session, self.name),
            _ => self.name.clone(),
        };
        if let Some(language) = &self.language {
            if self.data_type.is_translatable() {
                name.push('_');
                name.push_str(language);
            }
        }
        name
    }

    /// Wire form: data type byte followed by the scoped name
    pub fn to_bytes(&self) -> Vec<u8> {
        let name = self.scoped_name();
        let mut bytes = Vec::with_capacity(1 + name.len());
        bytes.push(self.data_type.code());
        bytes.extend_from_slice(name.as_bytes());
        bytes
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.data_type, self.scoped_name())
    }
}
