use std::hash::Hash;
use std::ops::{Deref, DerefMut};

use fxhash::FxBuildHasher;
use serde::{Deserialize, Serialize};

type FxHashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type FxHashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

/// Hash map keyed by the crate's small integer ids (and argument names).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Map<K: Eq + Hash, V>(FxHashMap<K, V>);

/// Hash set counterpart of [`Map`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Set<T: Eq + Hash>(FxHashSet<T>);

/// Constructors and transparent access to the wrapped hashbrown collection.
macro_rules! fx_collection {
    ($name: ident <$key: ident $(, $rest: ident)*>, $inner: ty) => {
        impl<$key: Eq + Hash $(, $rest)*> $name<$key $(, $rest)*> {
            #[inline]
            pub fn new() -> Self {
                Self::default()
            }
        }

        impl<$key: Eq + Hash $(, $rest)*> Default for $name<$key $(, $rest)*> {
            #[inline]
            fn default() -> Self {
                $name(<$inner>::default())
            }
        }

        impl<$key: Eq + Hash $(, $rest)*> Deref for $name<$key $(, $rest)*> {
            type Target = $inner;

            #[inline]
            fn deref(&self) -> &$inner {
                &self.0
            }
        }

        impl<$key: Eq + Hash $(, $rest)*> DerefMut for $name<$key $(, $rest)*> {
            #[inline]
            fn deref_mut(&mut self) -> &mut $inner {
                &mut self.0
            }
        }
    };
}

fx_collection!(Map<K, V>, FxHashMap<K, V>);
fx_collection!(Set<T>, FxHashSet<T>);

impl<K: Eq + Hash, V> FromIterator<(K, V)> for Map<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Map(iter.into_iter().collect())
    }
}

impl<T: Eq + Hash> FromIterator<T> for Set<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Set(iter.into_iter().collect())
    }
}

impl<K: Eq + Hash, V> IntoIterator for Map<K, V> {
    type Item = (K, V);
    type IntoIter = hashbrown::hash_map::IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, K: Eq + Hash, V> IntoIterator for &'a Map<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = hashbrown::hash_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'a, T: Eq + Hash> IntoIterator for &'a Set<T> {
    type Item = &'a T;
    type IntoIter = hashbrown::hash_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
