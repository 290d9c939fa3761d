//! Streaming XML printer

use crate::escape::EscapeWriter;
use quick_xml::escape::escape;
use std::io::{self, Write};

/// Printer over a type-erased sink, the form used by deferred writers.
pub type DynPrinter<'a> = XmlPrinter<&'a mut dyn Write>;

/// Writes XML elements directly to a sink.
///
/// The printer holds no document state: every method emits complete markup
/// and returns the number of bytes written. Text and attribute values are
/// escaped (`& < > " '`); element names are written verbatim.
pub struct XmlPrinter<W: Write> {
    out: W,
}

impl<W: Write> XmlPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// `<?xml version="1.0" encoding="utf-8"?>` followed by CRLF.
    pub fn xml_header(&mut self) -> io::Result<usize> {
        self.raw("<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n")
    }

    /// Writes a string without any escaping.
    pub fn raw(&mut self, s: &str) -> io::Result<usize> {
        self.out.write_all(s.as_bytes())?;
        Ok(s.len())
    }

    /// Writes escaped character data.
    pub fn text(&mut self, s: &str) -> io::Result<usize> {
        self.raw(&escape(s))
    }

    /// `<name attrs>` without closing.
    pub fn node_begin(&mut self, name: &str, attrs: &[(&str, &str)]) -> io::Result<usize> {
        let mut n = self.open_tag(name, attrs)?;
        n += self.raw(">")?;
        Ok(n)
    }

    /// `</name>`
    pub fn node_end(&mut self, name: &str) -> io::Result<usize> {
        let mut n = self.raw("</")?;
        n += self.raw(name)?;
        n += self.raw(">")?;
        Ok(n)
    }

    /// `<name attrs/>`
    pub fn node_empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> io::Result<usize> {
        let mut n = self.open_tag(name, attrs)?;
        n += self.raw("/>")?;
        Ok(n)
    }

    /// `<name>text</name>`, or `<name/>` when the text is empty.
    pub fn node_text(&mut self, name: &str, text: &str) -> io::Result<usize> {
        self.node_text_attrs(name, &[], text)
    }

    pub fn node_text_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> io::Result<usize> {
        if text.is_empty() {
            return self.node_empty(name, attrs);
        }
        let mut n = self.node_begin(name, attrs)?;
        n += self.text(text)?;
        n += self.node_end(name)?;
        Ok(n)
    }

    /// Writes `<name attrs>`, lets `content` print the children, then `</name>`.
    pub fn node_with<F>(&mut self, name: &str, attrs: &[(&str, &str)], content: F) -> io::Result<usize>
    where
        F: FnOnce(&mut Self) -> io::Result<usize>,
    {
        let mut n = self.node_begin(name, attrs)?;
        n += content(self)?;
        n += self.node_end(name)?;
        Ok(n)
    }

    /// SOAP argument: `<name>value</name>`
    pub fn argument(&mut self, name: &str, value: &str) -> io::Result<usize> {
        let mut n = self.node_begin(name, &[])?;
        n += self.text(value)?;
        n += self.node_end(name)?;
        Ok(n)
    }

    /// LastChange state variable: `<Name val="value"/>`
    pub fn state_variable(&mut self, name: &str, value: &str) -> io::Result<usize> {
        self.node_empty(name, &[("val", value)])
    }

    /// Runs `content` against a printer whose output is escaped once more,
    /// so that the markup it prints becomes the text of the enclosing element.
    ///
    /// Returns the number of bytes that reached this printer's sink.
    pub fn escaped<F>(&mut self, content: F) -> io::Result<usize>
    where
        F: FnOnce(&mut DynPrinter<'_>) -> io::Result<usize>,
    {
        let mut sink = EscapeWriter::new(&mut self.out);
        {
            let mut inner: DynPrinter<'_> = XmlPrinter::new(&mut sink as &mut dyn Write);
            content(&mut inner)?;
        }
        Ok(sink.written())
    }

    fn open_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> io::Result<usize> {
        let mut n = self.raw("<")?;
        n += self.raw(name)?;
        for (key, value) in attrs {
            n += self.raw(" ")?;
            n += self.raw(key)?;
            n += self.raw("=\"")?;
            n += self.text(value)?;
            n += self.raw("\"")?;
        }
        Ok(n)
    }
}
