use crate::bail;
use crate::io::DNSReadExt;
use crate::resource::Resource;
use crate::types::{Class, QR};
use byteorder::{ReadBytesExt, BE};
use std::io;
use std::io::Cursor;

/// Time-to-live of every cooked answer. Zero keeps fabricated records out of
/// resolver caches between interceptions.
const TTL: u32 = 0;

/// The parts of an incoming request the dispatcher works with.
///
/// Only the header and the first question are decoded. Anything after the
/// question section (for example an EDNS OPT record) is left alone; proxied
/// requests are forwarded from the original bytes so nothing is lost.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// 16-bit identifier assigned by the client, echoed into the response.
    pub id: u16,

    /// The two raw flag bytes, kept so a response can carry over the opcode
    /// and RD bits without decoding every field.
    pub flags: [u8; 2],

    /// Whether this message is a query or a response.
    pub qr: QR,

    /// Question name exactly as queried: case preserved, trailing dot
    /// removed. Lowercasing is the matcher's business.
    pub name: String,

    /// Question type as the raw wire value. See [`crate::types::type_name`].
    pub qtype: u16,

    /// Question class, echoed into the response untouched.
    pub qclass: u16,
}

impl Query {
    /// Decodes the header and question of the supplied request.
    pub fn from_slice(buf: &[u8]) -> io::Result<Query> {
        let mut cur = Cursor::new(buf);

        let id = cur.read_u16::<BE>()?;
        let flags = [cur.read_u8()?, cur.read_u8()?];
        let qr = QR::from_bool(flags[0] & 0b1000_0000 != 0);

        let qd_count = cur.read_u16::<BE>()?;
        if qd_count == 0 {
            bail!(InvalidData, "request without a question");
        }

        cur.read_u16::<BE>()?; // ANCOUNT
        cur.read_u16::<BE>()?; // NSCOUNT
        cur.read_u16::<BE>()?; // ARCOUNT

        let mut name = cur.read_qname()?;
        if name.ends_with('.') {
            name.pop();
        }

        let qtype = cur.read_u16::<BE>()?;
        let qclass = cur.read_u16::<BE>()?;

        Ok(Query {
            id,
            flags,
            qr,
            name,
            qtype,
            qclass,
        })
    }
}

/// Assembles the cooked response to `query` carrying the given answers.
///
/// Header bits per the proxy's contract: QR, AA and RA set, opcode and RD
/// carried over from the request, TC cleared, RCODE NOERROR. The question is
/// echoed back with the name cased exactly as it was asked, and every answer
/// names the queried domain.
pub fn build_response(query: &Query, answers: &[Resource]) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(512);

    buf.extend_from_slice(&query.id.to_be_bytes());
    buf.push(0b1000_0100 | (query.flags[0] & 0b0111_1001));
    buf.push(0b1000_0000);

    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&(answers.len() as u16).to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());

    write_qname(&mut buf, &query.name)?;
    buf.extend_from_slice(&query.qtype.to_be_bytes());
    buf.extend_from_slice(&query.qclass.to_be_bytes());

    for answer in answers {
        write_qname(&mut buf, &query.name)?;
        buf.extend_from_slice(&(answer.r#type() as u16).to_be_bytes());
        buf.extend_from_slice(&(Class::Internet as u16).to_be_bytes());
        buf.extend_from_slice(&TTL.to_be_bytes());

        let mut rdata = Vec::new();
        answer.write_rdata(&mut rdata)?;
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(&rdata);
    }

    Ok(buf)
}

/// Writes a domain name in uncompressed wire form.
pub(crate) fn write_qname(buf: &mut Vec<u8>, domain: &str) -> io::Result<()> {
    if !domain.is_empty() && domain != "." {
        for label in domain.split_terminator('.') {
            if label.is_empty() {
                bail!(InvalidData, "empty label in domain name '{}'", domain);
            }

            if label.len() > 63 {
                bail!(InvalidData, "label '{0}' longer than 63 characters", label);
            }

            // Write the length, then the actual label.
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
    }

    buf.push(0);

    Ok(())
}
