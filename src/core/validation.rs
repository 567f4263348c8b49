use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::catalog::*;
use super::error::ValidationError;
use super::types::*;

/// Tolerance for cross-checking rounded totals.
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// Maximum number of `campoAdicional` entries accepted by the XSD.
pub const MAX_ADDITIONAL_FIELDS: usize = 15;

/// Round a Decimal to `dp` decimal places using half-up (commercial rounding).
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Turn application line items into detail lines with per-line IVA.
///
/// `lineSubtotal = quantity × unitPrice − discount`, rounded to cents; the
/// line tax is `lineSubtotal × rate / 100`, rounded to cents.
pub fn calculate_lines(lines: &[LineItemInput], default_iva: IvaRate) -> Vec<DetailLine> {
    lines
        .iter()
        .map(|input| {
            let quantity = round_half_up(input.quantity, 6);
            let unit_price = round_half_up(input.unit_price, 6);
            let discount = round_half_up(input.discount, 2);
            let subtotal = round_half_up(quantity * unit_price - discount, 2);
            let iva = input.iva.unwrap_or(default_iva);
            let amount = round_half_up(subtotal * iva.rate() / dec!(100), 2);

            DetailLine {
                main_code: input.code.trim().to_string(),
                auxiliary_code: input.auxiliary_code.clone(),
                description: input.description.clone(),
                quantity,
                unit_price,
                discount,
                total_without_tax: subtotal,
                additional_details: input.additional_details.clone(),
                taxes: vec![LineTax {
                    tax_code: TaxCode::Iva,
                    percentage_code: iva.code().to_string(),
                    rate: iva.rate(),
                    taxable_base: subtotal,
                    amount,
                }],
            }
        })
        .collect()
}

/// Aggregate line taxes into one `totalImpuesto` per tax code + percentage code.
///
/// The aggregate amount is the sum of the already-rounded line amounts, so it
/// always agrees with the detail lines.
pub fn aggregate_taxes(lines: &[DetailLine]) -> Vec<TaxTotal> {
    let mut groups: BTreeMap<(TaxCode, String), TaxTotal> = BTreeMap::new();
    for tax in lines.iter().flat_map(|l| &l.taxes) {
        let entry = groups
            .entry((tax.tax_code, tax.percentage_code.clone()))
            .or_insert_with(|| TaxTotal {
                tax_code: tax.tax_code,
                percentage_code: tax.percentage_code.clone(),
                rate: tax.rate,
                taxable_base: Decimal::ZERO,
                amount: Decimal::ZERO,
            });
        entry.taxable_base += tax.taxable_base;
        entry.amount += tax.amount;
    }
    groups.into_values().collect()
}

/// Validate a built document against the SRI schema limits and arithmetic.
/// Returns all validation errors found (not just the first).
pub fn validate_invoice(doc: &InvoiceDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let tax = &doc.tax_info;
    let info = &doc.invoice_info;

    check_text(&tax.legal_name, "tax_info.legal_name", 300, true, &mut errors);
    if let Some(name) = &tax.trade_name {
        check_text(name, "tax_info.trade_name", 300, false, &mut errors);
    }
    check_text(&tax.matrix_address, "tax_info.matrix_address", 300, true, &mut errors);
    check_text(&info.buyer_name, "invoice_info.buyer_name", 300, true, &mut errors);
    check_text(&info.buyer_id, "invoice_info.buyer_id", 20, true, &mut errors);
    if let Some(addr) = &info.buyer_address {
        check_text(addr, "invoice_info.buyer_address", 300, false, &mut errors);
    }

    if info.buyer_id_type == BuyerIdType::Ruc && info.buyer_id.len() != 13 {
        errors.push(ValidationError::new(
            "invoice_info.buyer_id",
            "RUC buyers need a 13-digit identification",
        ));
    }
    if info.buyer_id_type == BuyerIdType::NationalId && info.buyer_id.len() != 10 {
        errors.push(ValidationError::new(
            "invoice_info.buyer_id",
            "cédula buyers need a 10-digit identification",
        ));
    }

    if doc.lines.is_empty() {
        errors.push(ValidationError::new(
            "lines",
            "invoice must have at least one line item",
        ));
    }
    for (i, line) in doc.lines.iter().enumerate() {
        validate_line(line, i, &mut errors);
    }

    if info.payments.is_empty() {
        errors.push(ValidationError::new(
            "invoice_info.payments",
            "invoice must have at least one payment",
        ));
    }
    for (i, p) in info.payments.iter().enumerate() {
        if p.amount <= Decimal::ZERO {
            errors.push(ValidationError::new(
                format!("invoice_info.payments[{i}].amount"),
                "payment amount must be positive",
            ));
        }
    }

    if doc.additional_info.len() > MAX_ADDITIONAL_FIELDS {
        errors.push(ValidationError::new(
            "additional_info",
            format!("at most {MAX_ADDITIONAL_FIELDS} additional fields are allowed"),
        ));
    }
    for (i, field) in doc.additional_info.iter().enumerate() {
        check_text(&field.name, &format!("additional_info[{i}].name"), 300, true, &mut errors);
        check_text(&field.value, &format!("additional_info[{i}].value"), 300, true, &mut errors);
    }

    errors.extend(validate_arithmetic(doc));

    if info.buyer_id_type == BuyerIdType::FinalConsumer && info.grand_total > FINAL_CONSUMER_LIMIT
    {
        errors.push(ValidationError::new(
            "invoice_info.grand_total",
            format!(
                "final consumer invoices cannot exceed {FINAL_CONSUMER_LIMIT} (got {})",
                info.grand_total
            ),
        ));
    }

    errors
}

/// Cross-check document totals, tax aggregates and payments.
pub fn validate_arithmetic(doc: &InvoiceDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let info = &doc.invoice_info;

    let line_total: Decimal = doc.lines.iter().map(|l| l.total_without_tax).sum();
    if (line_total - info.total_without_taxes).abs() > AMOUNT_TOLERANCE {
        errors.push(ValidationError::new(
            "invoice_info.total_without_taxes",
            format!(
                "total without taxes {} does not match sum of lines {line_total}",
                info.total_without_taxes
            ),
        ));
    }

    let discount_total: Decimal = doc.lines.iter().map(|l| l.discount).sum();
    if (discount_total - info.total_discount).abs() > AMOUNT_TOLERANCE {
        errors.push(ValidationError::new(
            "invoice_info.total_discount",
            format!(
                "total discount {} does not match sum of line discounts {discount_total}",
                info.total_discount
            ),
        ));
    }

    let line_tax: Decimal = doc
        .lines
        .iter()
        .flat_map(|l| &l.taxes)
        .map(|t| t.amount)
        .sum();
    let aggregate_tax: Decimal = info.tax_totals.iter().map(|t| t.amount).sum();
    if (line_tax - aggregate_tax).abs() > AMOUNT_TOLERANCE {
        errors.push(ValidationError::new(
            "invoice_info.tax_totals",
            format!("tax totals {aggregate_tax} do not match line taxes {line_tax}"),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for t in &info.tax_totals {
        if !seen.insert((t.tax_code, t.percentage_code.as_str())) {
            errors.push(ValidationError::new(
                "invoice_info.tax_totals",
                format!(
                    "duplicate tax total for code {} / {}",
                    t.tax_code.code(),
                    t.percentage_code
                ),
            ));
        }
    }

    let expected_total = info.total_without_taxes + aggregate_tax + info.tip;
    if (expected_total - info.grand_total).abs() > AMOUNT_TOLERANCE {
        errors.push(ValidationError::new(
            "invoice_info.grand_total",
            format!(
                "grand total {} does not match {} + {} + tip {}",
                info.grand_total, info.total_without_taxes, aggregate_tax, info.tip
            ),
        ));
    }

    if !info.payments.is_empty() {
        let paid: Decimal = info.payments.iter().map(|p| p.amount).sum();
        if (paid - info.grand_total).abs() > AMOUNT_TOLERANCE {
            errors.push(ValidationError::new(
                "invoice_info.payments",
                format!(
                    "payments {paid} do not add up to grand total {}",
                    info.grand_total
                ),
            ));
        }
    }

    errors
}

fn validate_line(line: &DetailLine, index: usize, errors: &mut Vec<ValidationError>) {
    let prefix = format!("lines[{index}]");
    check_text(&line.main_code, &format!("{prefix}.main_code"), 25, true, errors);
    if let Some(aux) = &line.auxiliary_code {
        check_text(aux, &format!("{prefix}.auxiliary_code"), 25, false, errors);
    }
    check_text(&line.description, &format!("{prefix}.description"), 300, true, errors);

    if line.quantity <= Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{prefix}.quantity"),
            "quantity must be positive",
        ));
    }
    if line.unit_price < Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{prefix}.unit_price"),
            "unit price must not be negative",
        ));
    }
    if line.discount < Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{prefix}.discount"),
            "discount must not be negative",
        ));
    }
    if line.total_without_tax < Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{prefix}.discount"),
            "discount exceeds the line amount",
        ));
    }
    if line.taxes.is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.taxes"),
            "line must carry at least one tax entry",
        ));
    }
    if line.additional_details.len() > 3 {
        errors.push(ValidationError::new(
            format!("{prefix}.additional_details"),
            "at most 3 additional details per line",
        ));
    }
}

fn check_text(
    value: &str,
    field: &str,
    max_chars: usize,
    required: bool,
    errors: &mut Vec<ValidationError>,
) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if required {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
        return;
    }
    let count = trimmed.chars().count();
    if count > max_chars {
        errors.push(ValidationError::new(
            field,
            format!("exceeds {max_chars} characters ({count})"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(code: &str, qty: Decimal, price: Decimal) -> LineItemInput {
        LineItemInput::new(code, format!("Item {code}"), qty, price)
    }

    #[test]
    fn line_subtotal_and_tax() {
        let lines = calculate_lines(
            &[line("A", dec!(3), dec!(1.255)).discount(dec!(0.50))],
            IvaRate::Fifteen,
        );
        // 3 * 1.255 = 3.765 - 0.50 = 3.265 -> 3.27; 3.27 * 0.15 = 0.4905 -> 0.49
        assert_eq!(lines[0].total_without_tax, dec!(3.27));
        assert_eq!(lines[0].taxes[0].amount, dec!(0.49));
        assert_eq!(lines[0].taxes[0].percentage_code, "4");
    }

    #[test]
    fn per_line_iva_overrides_default() {
        let lines = calculate_lines(
            &[line("A", dec!(1), dec!(10)).iva(IvaRate::Zero)],
            IvaRate::Fifteen,
        );
        assert_eq!(lines[0].taxes[0].amount, dec!(0));
        assert_eq!(lines[0].taxes[0].percentage_code, "0");
    }

    #[test]
    fn aggregation_merges_same_rate() {
        let lines = calculate_lines(
            &[
                line("A", dec!(1), dec!(10)),
                line("B", dec!(1), dec!(20)),
                line("C", dec!(1), dec!(5)).iva(IvaRate::Zero),
            ],
            IvaRate::Fifteen,
        );
        let totals = aggregate_taxes(&lines);
        assert_eq!(totals.len(), 2);
        let fifteen = totals.iter().find(|t| t.percentage_code == "4").unwrap();
        assert_eq!(fifteen.taxable_base, dec!(30));
        assert_eq!(fifteen.amount, dec!(4.50));
        let zero = totals.iter().find(|t| t.percentage_code == "0").unwrap();
        assert_eq!(zero.taxable_base, dec!(5));
    }

    #[test]
    fn check_text_limits() {
        let mut errors = Vec::new();
        check_text("", "f", 10, true, &mut errors);
        check_text("", "g", 10, false, &mut errors);
        check_text("ñññññññññññ", "h", 10, true, &mut errors);
        check_text("ñññññññññ", "i", 10, true, &mut errors);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["f", "h"]);
    }

    #[test]
    fn round_half_up_midpoint() {
        assert_eq!(round_half_up(dec!(0.125), 2), dec!(0.13));
        assert_eq!(round_half_up(dec!(0.135), 2), dec!(0.14));
        assert_eq!(round_half_up(dec!(-0.125), 2), dec!(-0.13));
    }
}
