use std::cmp;

fn bits_helper(n: u64, i: u64) -> u64 {
    if n == 0 {
        i
    } else {
        bits_helper(n / 2, i + 1)
    }
}

/// Number of bits needed to represent a number.
pub fn bits_needed_for(n: u64) -> u64 {
    cmp::max(bits_helper(n.saturating_sub(1), 0), 1)
}

/// True for 1, 2, 4, 8, ...
pub fn is_power_of_two(n: u64) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Greatest common divisor of two non-negative numbers. `gcd(0, 0) == 0`.
pub fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}
