/// Returns the zero-based position of the most significant set bit, or -1
/// when no bit is set.
///
/// ```
/// # use lattice_shared::index_of_last_bit;
/// assert_eq!(index_of_last_bit(0), -1);
/// assert_eq!(index_of_last_bit(42), 5);
/// assert_eq!(index_of_last_bit(1 << 11), 11);
/// ```
pub fn index_of_last_bit(value: u64) -> i32 {
    if value == 0 {
        return -1;
    }
    63 - value.leading_zeros() as i32
}
