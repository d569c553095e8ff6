// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! PEM encoding of the certificates delivered in `x5c`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bherror::traits::{ErrorContext as _, ForeignError as _};
use openssl::x509::X509;

use crate::{Endpoint, Error, Result};

/// Convert an `x5c` chain element (standard base64 DER, see
/// [RFC7517 section 4.7](https://datatracker.ietf.org/doc/html/rfc7517#section-4.7))
/// into a PEM certificate.
///
/// Whitespace inside the element is ignored. The DER must parse as an X.509
/// certificate.
pub fn certificate_pem_from_x5c(x5c: &str) -> Result<String, Error> {
    let invalid = |reason: &str| {
        let reason = reason.to_owned();
        move || Error::InvalidResponse(Endpoint::CertificateIssuance, reason)
    };

    let compact: String = x5c.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let der = STANDARD
        .decode(compact)
        .foreign_err(invalid("`x5c` is not valid base64"))?;

    let pem = X509::from_der(&der)
        .foreign_err(invalid("`x5c` is not an X.509 certificate"))?
        .to_pem()
        .foreign_err(invalid("`x5c` cannot be PEM encoded"))?;

    String::from_utf8(pem)
        .foreign_err(invalid("`x5c` cannot be PEM encoded"))
        .ctx(|| "PEM output is not UTF-8")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bh_jws_rsa::{RsaSigner, SigningAlgorithm};

    use super::*;

    fn certificate_der() -> Vec<u8> {
        RsaSigner::generate("qwac-1".to_owned(), SigningAlgorithm::Rs256)
            .unwrap()
            .dummy_certificate_der()
    }

    #[test]
    fn certificate_is_wrapped_at_64_columns() {
        let der = certificate_der();

        let pem = certificate_pem_from_x5c(&STANDARD.encode(&der)).unwrap();

        let lines: Vec<&str> = pem.lines().collect();
        assert_eq!(lines.first(), Some(&"-----BEGIN CERTIFICATE-----"));
        assert_eq!(lines.last(), Some(&"-----END CERTIFICATE-----"));
        let body = &lines[1..lines.len() - 1];
        assert!(body[..body.len() - 1].iter().all(|line| line.len() == 64));
        assert!(body.last().unwrap().len() <= 64);
        assert_eq!(STANDARD.decode(body.concat()).unwrap(), der);
        assert_eq!(X509::from_pem(pem.as_bytes()).unwrap().to_der().unwrap(), der);
    }

    #[test]
    fn whitespace_inside_x5c_is_ignored() {
        let der = certificate_der();
        let encoded = STANDARD.encode(&der);
        let (head, tail) = encoded.split_at(40);

        let pem = certificate_pem_from_x5c(&format!(" {head}\n{tail}\n")).unwrap();

        assert_eq!(pem, certificate_pem_from_x5c(&encoded).unwrap());
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let error = certificate_pem_from_x5c("not*base64").unwrap_err();

        assert_eq!(
            error.error,
            Error::InvalidResponse(
                Endpoint::CertificateIssuance,
                "`x5c` is not valid base64".to_owned()
            )
        );
    }

    #[test]
    fn der_that_is_not_a_certificate_is_rejected() {
        let error = certificate_pem_from_x5c(&STANDARD.encode(b"certificate bytes")).unwrap_err();

        assert_matches!(
            error.error,
            Error::InvalidResponse(Endpoint::CertificateIssuance, ref reason)
                if reason.contains("X.509")
        );
    }
}
