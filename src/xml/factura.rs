use super::writer::{XmlResult, XmlWriter, format_amount, normalize_text};
use super::{DS_NS, FACTURA_VERSION};
use crate::core::*;

/// Render an invoice as `factura` 1.1.0 XML in XSD element order.
///
/// The access key must already be attached. Output is compact and
/// deterministic: the same document always yields the same bytes.
pub fn to_factura_xml(doc: &InvoiceDocument) -> XmlResult {
    let access_key = doc.tax_info.access_key.as_ref().ok_or_else(|| {
        SriError::Validation("access key must be attached before XML generation".into())
    })?;
    if doc.tax_info.document_type != DocumentType::Invoice {
        return Err(SriError::Validation(format!(
            "document type {} cannot be rendered as factura",
            doc.tax_info.document_type.code()
        )));
    }

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "factura",
        &[
            ("xmlns:ds", DS_NS),
            ("id", "comprobante"),
            ("version", FACTURA_VERSION),
        ],
    )?;

    write_tax_info(&mut w, &doc.tax_info, access_key)?;
    write_invoice_info(&mut w, &doc.invoice_info)?;
    write_details(&mut w, &doc.lines)?;
    write_additional_info(&mut w, &doc.additional_info)?;

    w.end_element("factura")?;
    w.into_string()
}

fn write_tax_info(w: &mut XmlWriter, tax: &TaxInfo, key: &AccessKey) -> Result<(), SriError> {
    w.start_element("infoTributaria")?;
    w.text_element("ambiente", tax.environment.code())?;
    w.text_element("tipoEmision", tax.emission_type.code())?;
    w.free_text_element("razonSocial", &tax.legal_name)?;
    w.optional_element("nombreComercial", tax.trade_name.as_deref())?;
    w.text_element("ruc", &tax.ruc)?;
    w.text_element("claveAcceso", key.as_str())?;
    w.text_element("codDoc", tax.document_type.code())?;
    w.text_element("estab", &tax.establishment)?;
    w.text_element("ptoEmi", &tax.emission_point)?;
    w.text_element("secuencial", &tax.sequential)?;
    w.free_text_element("dirMatriz", &tax.matrix_address)?;
    w.optional_element("agenteRetencion", tax.withholding_agent.as_deref())?;
    w.optional_element("contribuyenteRimpe", tax.rimpe.as_deref())?;
    w.end_element("infoTributaria")?;
    Ok(())
}

fn write_invoice_info(w: &mut XmlWriter, info: &InvoiceInfo) -> Result<(), SriError> {
    w.start_element("infoFactura")?;
    w.text_element(
        "fechaEmision",
        &info.emission_date.format("%d/%m/%Y").to_string(),
    )?;
    w.optional_element("dirEstablecimiento", info.establishment_address.as_deref())?;
    w.optional_element("contribuyenteEspecial", info.special_taxpayer.as_deref())?;
    w.text_element(
        "obligadoContabilidad",
        if info.accounting_obligated { "SI" } else { "NO" },
    )?;
    w.text_element("tipoIdentificacionComprador", info.buyer_id_type.code())?;
    w.free_text_element("razonSocialComprador", &info.buyer_name)?;
    w.text_element("identificacionComprador", &info.buyer_id)?;
    w.optional_element("direccionComprador", info.buyer_address.as_deref())?;
    w.amount_element("totalSinImpuestos", info.total_without_taxes)?;
    w.amount_element("totalDescuento", info.total_discount)?;

    w.start_element("totalConImpuestos")?;
    for t in &info.tax_totals {
        w.start_element("totalImpuesto")?;
        w.text_element("codigo", t.tax_code.code())?;
        w.text_element("codigoPorcentaje", &t.percentage_code)?;
        w.amount_element("baseImponible", t.taxable_base)?;
        w.amount_element("valor", t.amount)?;
        w.end_element("totalImpuesto")?;
    }
    w.end_element("totalConImpuestos")?;

    w.amount_element("propina", info.tip)?;
    w.amount_element("importeTotal", info.grand_total)?;
    w.text_element("moneda", &info.currency)?;

    w.start_element("pagos")?;
    for p in &info.payments {
        w.start_element("pago")?;
        w.text_element("formaPago", p.method.code())?;
        w.amount_element("total", p.amount)?;
        if let Some(term) = p.term {
            w.text_element("plazo", &term.to_string())?;
        }
        w.optional_element("unidadTiempo", p.time_unit.as_deref())?;
        w.end_element("pago")?;
    }
    w.end_element("pagos")?;

    w.end_element("infoFactura")?;
    Ok(())
}

fn write_details(w: &mut XmlWriter, lines: &[DetailLine]) -> Result<(), SriError> {
    w.start_element("detalles")?;
    for line in lines {
        w.start_element("detalle")?;
        w.text_element("codigoPrincipal", &line.main_code)?;
        w.optional_element("codigoAuxiliar", line.auxiliary_code.as_deref())?;
        w.free_text_element("descripcion", &line.description)?;
        w.quantity_element("cantidad", line.quantity)?;
        w.quantity_element("precioUnitario", line.unit_price)?;
        w.amount_element("descuento", line.discount)?;
        w.amount_element("precioTotalSinImpuesto", line.total_without_tax)?;

        if !line.additional_details.is_empty() {
            w.start_element("detallesAdicionales")?;
            for d in &line.additional_details {
                let name = normalize_text(&d.name);
                let value = normalize_text(&d.value);
                w.start_element_with_attrs(
                    "detAdicional",
                    &[("nombre", name.as_str()), ("valor", value.as_str())],
                )?;
                w.end_element("detAdicional")?;
            }
            w.end_element("detallesAdicionales")?;
        }

        w.start_element("impuestos")?;
        for tax in &line.taxes {
            w.start_element("impuesto")?;
            w.text_element("codigo", tax.tax_code.code())?;
            w.text_element("codigoPorcentaje", &tax.percentage_code)?;
            w.text_element("tarifa", &format_amount(tax.rate))?;
            w.amount_element("baseImponible", tax.taxable_base)?;
            w.amount_element("valor", tax.amount)?;
            w.end_element("impuesto")?;
        }
        w.end_element("impuestos")?;

        w.end_element("detalle")?;
    }
    w.end_element("detalles")?;
    Ok(())
}

fn write_additional_info(w: &mut XmlWriter, fields: &[AdditionalField]) -> Result<(), SriError> {
    if fields.is_empty() {
        return Ok(());
    }
    w.start_element("infoAdicional")?;
    for f in fields {
        let name = normalize_text(&f.name);
        w.text_element_with_attrs(
            "campoAdicional",
            &normalize_text(&f.value),
            &[("nombre", name.as_str())],
        )?;
    }
    w.end_element("infoAdicional")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn document() -> InvoiceDocument {
        let issuer = IssuerRecord {
            ruc: "1234567890001".into(),
            legal_name: "PANADER\u{cd}A \u{201C}EL TRIGAL\u{201D} & CIA".into(),
            trade_name: None,
            establishment: "001".into(),
            emission_point: "001".into(),
            matrix_address: "Av. 10 de Agosto <N24>".into(),
            establishment_address: None,
            environment: Environment::Test,
            accounting_obligated: true,
            special_taxpayer: None,
            withholding_agent: None,
            rimpe: Some("CONTRIBUYENTE R\u{c9}GIMEN RIMPE".into()),
            default_iva: None,
        };
        let mut doc = InvoiceBuilder::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
            .issuer(issuer)
            .buyer(BuyerRecord::final_consumer())
            .sequential("1")
            .add_line(
                LineItemInput::new("PAN-01", "Pan de yuca", dec!(4), dec!(0.25))
                    .detail("Lote", "A-17"),
            )
            .add_payment(PaymentInput::full(PaymentMethod::Cash))
            .build()
            .unwrap();
        let key = AccessKeyGenerator::new()
            .generate_with_code(access_key_request(&doc), "12345678")
            .unwrap();
        doc.tax_info.access_key = Some(key);
        doc
    }

    #[test]
    fn root_and_order() {
        let xml = to_factura_xml(&document()).unwrap();
        assert!(xml.starts_with(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><factura xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" id=\"comprobante\" version=\"1.1.0\"><infoTributaria><ambiente>1</ambiente>"
        ));
        let order = [
            "<infoTributaria>",
            "<claveAcceso>",
            "<dirMatriz>",
            "<contribuyenteRimpe>",
            "<infoFactura>",
            "<fechaEmision>15/01/2024</fechaEmision>",
            "<obligadoContabilidad>SI</obligadoContabilidad>",
            "<totalSinImpuestos>1.00</totalSinImpuestos>",
            "<totalConImpuestos>",
            "<propina>0.00</propina>",
            "<importeTotal>1.15</importeTotal>",
            "<moneda>DOLAR</moneda>",
            "<pagos>",
            "<detalles>",
            "<cantidad>4.000000</cantidad>",
            "<precioUnitario>0.250000</precioUnitario>",
            "<detallesAdicionales><detAdicional nombre=\"Lote\" valor=\"A-17\"></detAdicional></detallesAdicionales>",
            "<tarifa>15.00</tarifa>",
        ];
        let mut last = 0;
        for tag in order {
            let pos = xml[last..]
                .find(tag)
                .unwrap_or_else(|| panic!("{tag} missing or out of order"));
            last += pos;
        }
        assert!(xml.ends_with("</detalles></factura>"));
    }

    #[test]
    fn escapes_and_normalizes_text() {
        let xml = to_factura_xml(&document()).unwrap();
        assert!(xml.contains("<razonSocial>PANADER\u{cd}A \"EL TRIGAL\" &amp; CIA</razonSocial>"));
        assert!(xml.contains("<dirMatriz>Av. 10 de Agosto &lt;N24&gt;</dirMatriz>"));
    }

    #[test]
    fn absent_optionals_are_omitted() {
        let xml = to_factura_xml(&document()).unwrap();
        assert!(!xml.contains("nombreComercial"));
        assert!(!xml.contains("direccionComprador"));
        assert!(!xml.contains("infoAdicional"));
        assert!(!xml.contains("/>"));
    }

    #[test]
    fn requires_access_key() {
        let mut doc = document();
        doc.tax_info.access_key = None;
        assert!(matches!(to_factura_xml(&doc), Err(SriError::Validation(_))));
    }

    #[test]
    fn serialization_is_deterministic() {
        let doc = document();
        assert_eq!(to_factura_xml(&doc).unwrap(), to_factura_xml(&doc).unwrap());
    }
}
