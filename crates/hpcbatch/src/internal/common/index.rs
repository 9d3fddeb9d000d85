use std::marker::PhantomData;
use std::ops::{Deref, Index, IndexMut};

/// Dense storage addressed by an id type instead of `usize`.
///
/// Nodes of a ledger and actions of a job get consecutive ids from zero,
/// so their id is their position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexVec<Idx, Value> {
    items: Vec<Value>,
    _id: PhantomData<fn(Idx)>,
}

impl<Idx, Value> Default for IndexVec<Idx, Value> {
    fn default() -> Self {
        Vec::new().into()
    }
}

impl<Idx, Value> From<Vec<Value>> for IndexVec<Idx, Value> {
    fn from(items: Vec<Value>) -> Self {
        IndexVec {
            items,
            _id: PhantomData,
        }
    }
}

impl<Idx: From<u32> + Into<usize>, Value> IndexVec<Idx, Value> {
    pub fn push(&mut self, value: Value) -> Idx {
        self.items.push(value);
        Idx::from(self.items.len() as u32 - 1)
    }

    pub fn get(&self, id: Idx) -> Option<&Value> {
        self.items.get(id.into())
    }

    pub fn get_mut(&mut self, id: Idx) -> Option<&mut Value> {
        self.items.get_mut(id.into())
    }

    /// All ids in ascending order. The iterator does not borrow the storage.
    pub fn ids(&self) -> impl Iterator<Item = Idx> + use<Idx, Value> {
        let count = self.items.len() as u32;
        (0..count).map(Idx::from)
    }
}

impl<Idx, Value> Deref for IndexVec<Idx, Value> {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.items
    }
}

impl<Idx: Into<usize>, Value> Index<Idx> for IndexVec<Idx, Value> {
    type Output = Value;

    #[inline]
    fn index(&self, id: Idx) -> &Value {
        &self.items[id.into()]
    }
}

impl<Idx: Into<usize>, Value> IndexMut<Idx> for IndexVec<Idx, Value> {
    #[inline]
    fn index_mut(&mut self, id: Idx) -> &mut Value {
        &mut self.items[id.into()]
    }
}

/// Declares a `Copy` id newtype over an unsigned integer.
#[macro_export]
macro_rules! define_id_type {
    ($name: ident, $repr: ty) => {
        #[derive(
            Copy, Clone, Default, Debug, Hash, PartialEq, Eq, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            #[inline]
            pub const fn new(value: $repr) -> Self {
                $name(value)
            }

            #[inline]
            pub fn as_num(&self) -> $repr {
                self.0
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                $name(value)
            }
        }

        impl From<$name> for usize {
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
