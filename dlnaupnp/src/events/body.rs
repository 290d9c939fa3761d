//! Corps d'un NOTIFY, produit à la demande.
//!
//! Le `e:propertyset` n'est jamais matérialisé : sa longueur est calculée par
//! une première passe sans sortie, puis il est réécrit directement dans le
//! flux de l'envoi ou relu morceau par morceau via [`NotifyBodyReader`].

use std::io::{self, Read, Write};
use std::sync::Arc;

use super::{ChangeWriter, write_property_set};
use crate::http::ByteCounter;

/// `e:propertyset` d'un service regroupant des changements en attente.
#[derive(Clone)]
pub struct NotifyBody {
    service: String,
    changes: Arc<[ChangeWriter]>,
}

impl NotifyBody {
    pub fn new(service: impl Into<String>, changes: impl Into<Arc<[ChangeWriter]>>) -> Self {
        Self {
            service: service.into(),
            changes: changes.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn changes_count(&self) -> usize {
        self.changes.len()
    }

    /// Écrit le corps complet dans `out`.
    pub fn write_to<W: Write>(&self, out: W) -> io::Result<usize> {
        write_property_set(out, &self.service, &self.changes)
    }

    /// Taille exacte du corps, sans le conserver.
    pub fn content_length(&self) -> io::Result<u64> {
        let mut counter = ByteCounter::default();
        self.write_to(&mut counter)?;
        Ok(counter.count())
    }

    pub fn into_reader(self) -> NotifyBodyReader {
        NotifyBodyReader {
            body: self,
            offset: 0,
            done: false,
        }
    }
}

impl std::fmt::Debug for NotifyBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBody")
            .field("service", &self.service)
            .field("changes", &self.changes.len())
            .finish()
    }
}

/// Lecture d'un [`NotifyBody`] par fenêtres.
///
/// Chaque `read` réécrit le document et n'en garde que la fenêtre
/// `[offset, offset + buf.len())` ; les écrivains de changements doivent donc
/// produire la même sortie à chaque appel.
pub struct NotifyBodyReader {
    body: NotifyBody,
    offset: u64,
    done: bool,
}

impl Read for NotifyBodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        let mut window = Window {
            skip: self.offset,
            buf,
            filled: 0,
        };
        let full = match self.body.write_to(&mut window) {
            Ok(_) => false,
            Err(e) if e.kind() == io::ErrorKind::WriteZero && window.is_full() => true,
            Err(e) => return Err(e),
        };
        let filled = window.filled;
        if !full && filled < window.buf.len() {
            self.done = true;
        }
        self.offset += filled as u64;
        Ok(filled)
    }
}

/// Écrivain qui ignore les `skip` premiers octets puis remplit `buf`.
struct Window<'a> {
    skip: u64,
    buf: &'a mut [u8],
    filled: usize,
}

impl Window<'_> {
    fn is_full(&self) -> bool {
        self.filled == self.buf.len()
    }
}

impl Write for Window<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut data = data;
        if self.skip > 0 {
            let skipped = data.len().min(usize::try_from(self.skip).unwrap_or(usize::MAX));
            self.skip -= skipped as u64;
            data = &data[skipped..];
            if data.is_empty() {
                return Ok(skipped);
            }
        }
        if self.is_full() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "window full"));
        }
        let n = data.len().min(self.buf.len() - self.filled);
        self.buf[self.filled..self.filled + n].copy_from_slice(&data[..n]);
        self.filled += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
