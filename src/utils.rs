/// Format `buffer` as a classic 16-bytes-per-line hexdump, labelling
/// lines with addresses starting at `base`.
pub fn hexdump(buffer: &[u8], base: u16) -> String {
    let mut str = String::new();

    for (row, chunk) in buffer.chunks(16).enumerate() {
        let addr = base.wrapping_add((row * 16) as u16);
        let mut line = format!("{:04x}: ", addr);
        let mut chars = String::new();

        for &byte in chunk {
            line.push_str(&format!("{:02x} ", byte));
            let c = byte as char;
            chars.push(if c.is_ascii_graphic() || c == ' ' {
                c
            } else {
                '.'
            });
        }

        str.push_str(&format!("{:<54} {}\n", line, chars));
    }

    str
}
