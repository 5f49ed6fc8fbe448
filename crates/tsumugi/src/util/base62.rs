const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encode `data`, read as one big-endian unsigned integer, in base62.
///
/// Leading zero bytes do not contribute digits, and zero encodes to an empty string.
pub fn encode(data: &[u8]) -> String {
    let mut number: Vec<u8> = data.iter().copied().skip_while(|b| *b == 0).collect();
    let mut digits = Vec::new();

    while !number.is_empty() {
        // long division of the base-256 number by 62
        let mut quotient = Vec::with_capacity(number.len());
        let mut remainder = 0u32;
        for byte in &number {
            let acc = (remainder << 8) | *byte as u32;
            let q = (acc / 62) as u8;
            remainder = acc % 62;
            if !quotient.is_empty() || q != 0 {
                quotient.push(q);
            }
        }

        digits.push(ALPHABET[remainder as usize]);
        number = quotient;
    }

    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
