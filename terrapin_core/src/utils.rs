/*! Common utility functions
*/

use rand::Rng;

/// Generate a non-zero random id. Used for request ids and partial
/// tunnel ids, where zero is reserved as "unset".
pub fn gen_id() -> u32 {
    let mut id = 0;
    while id == 0 {
        id = rand::thread_rng().gen();
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_id_is_non_zero() {
        for _ in 0..100 {
            assert_ne!(gen_id(), 0);
        }
    }
}
