use anyhow::Result;
use site_builder_core::Catalog;

use crate::CatalogSection;
use crate::context::AppContext;

pub fn show(ctx: &AppContext, section: CatalogSection) -> Result<()> {
    let catalog = ctx.catalog();
    let all = section == CatalogSection::All;

    if all || section == CatalogSection::Components {
        print_components(catalog);
    }
    if all || section == CatalogSection::Templates {
        print_templates(catalog);
    }
    if all || section == CatalogSection::Schemes {
        print_schemes(catalog);
    }
    Ok(())
}

fn print_components(catalog: &Catalog) {
    println!("🧩 Components:");
    for component in catalog.components.list() {
        let fields: Vec<&str> = component
            .editable_fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        println!(
            "   {:<20} {:<12} {}",
            component.id,
            component.category.as_str(),
            component.name
        );
        if !fields.is_empty() {
            println!("   {:<20} fields: {}", "", fields.join(", "));
        }
    }
    println!();
}

fn print_templates(catalog: &Catalog) {
    println!("📐 Templates:");
    for template in catalog.templates.list() {
        let slots: Vec<&str> = template.slots.iter().map(|s| s.id.as_str()).collect();
        println!(
            "   {:<20} {:<28} colors: {}",
            template.id, template.name, template.default_color_scheme
        );
        println!("   {:<20} slots: {}", "", slots.join(", "));
    }
    println!();
}

fn print_schemes(catalog: &Catalog) {
    println!("🎨 Color schemes:");
    for scheme in catalog.color_schemes.list() {
        let primary = scheme.colors.get("primary").map(String::as_str).unwrap_or("-");
        println!("   {:<20} {:<28} primary: {}", scheme.id, scheme.name, primary);
    }
    println!("   {:<20} overrides only", site_builder_core::CUSTOM_SCHEME_ID);
    println!();
}
