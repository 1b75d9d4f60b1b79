use std::fmt;
use std::io::{self, Cursor, Read};

/// 渲染结果
#[derive(Debug)]
pub struct Rendered {
    inner: Cursor<Vec<u8>>,
}

impl Rendered {
    pub(crate) fn new(html: String) -> Self {
        Self {
            inner: Cursor::new(html.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.get_ref()
    }

    pub fn into_string(self) -> String {
        // 由 String 构造，必然是合法 UTF-8
        String::from_utf8_lossy(&self.inner.into_inner()).into_owned()
    }
}

impl Read for Rendered {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read() {
        let mut r = Rendered::new("<p>hi</p>".to_string());
        let mut first = [0u8; 3];
        r.read_exact(&mut first).unwrap();
        assert_eq!(&first, b"<p>");

        let mut rest = String::new();
        r.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "hi</p>");
        assert_eq!(r.to_string(), "<p>hi</p>");
    }
}
