#[cfg(test)]
mod test_easy;
#[cfg(test)]
mod test_ledger;

pub mod utils;
