/// Display language for labels, statuses and number formatting.
#[derive(
    clap::ValueEnum,
    strum::Display,
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ru,
    Sr,
    En,
}

impl Language {
    fn uses_decimal_comma(self) -> bool {
        matches!(self, Language::Ru | Language::Sr)
    }

    /// Translate a message key, falling back to the key itself.
    pub fn text<'a>(self, key: &'a str) -> &'a str {
        let Some(index) = KEYS.iter().position(|k| *k == key) else {
            return key;
        };
        match self {
            Language::En => EN[index],
            Language::Ru => RU[index],
            Language::Sr => SR[index],
        }
    }

    /// Same as [`Self::text`], but substitutes `{}` placeholders in order.
    pub fn message(self, key: &str, args: &[&dyn std::fmt::Display]) -> String {
        let mut out = String::new();
        let mut args = args.iter();
        let mut pieces = self.text(key).split("{}").peekable();
        while let Some(piece) = pieces.next() {
            out.push_str(piece);
            if pieces.peek().is_some() {
                if let Some(arg) = args.next() {
                    out.push_str(&arg.to_string());
                }
            }
        }
        out
    }

    /// Format a number the way the user expects to read it; non-finite values become a dash.
    pub fn number(self, value: f64, digits: usize) -> String {
        if !value.is_finite() {
            return DASH.to_string();
        }
        let formatted = format!("{value:.digits$}");
        if self.uses_decimal_comma() {
            formatted.replace('.', ",")
        } else {
            formatted
        }
    }

    pub fn optional(self, value: Option<f64>, digits: usize) -> String {
        value.map_or_else(|| DASH.to_string(), |v| self.number(v, digits))
    }

    /// Cross-sections print without decimals when whole.
    pub fn area(self, area: f64) -> String {
        self.number(area, if area.fract() == 0.0 { 0 } else { 1 })
    }
}

pub const DASH: &str = "—";

/// Parse a number typed with either a decimal point or a decimal comma.
pub fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim().replace(',', ".");
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

macro_rules! translations {
    ($($key:literal => $en:literal, $ru:literal, $sr:literal;)*) => {
        const KEYS: &[&str] = &[$($key),*];
        const EN: &[&str] = &[$($en),*];
        const RU: &[&str] = &[$($ru),*];
        const SR: &[&str] = &[$($sr),*];
    };
}

translations! {
    "column.circuit" => "Circuit", "Цепь", "Strujni krug";
    "column.from" => "From", "От", "OD";
    "column.to" => "To", "До", "DO";
    "column.insulation" => "Insulation", "Изоляция", "Izolacija";
    "column.conductor" => "Conductor", "Проводник", "Provodnik";
    "column.cable" => "Cable", "Кабель", "Kabl";
    "column.cores" => "nž", "nž", "nž";
    "column.n_parallel" => "n∥", "n∥", "n∥";
    "column.group_for_s" => "Cables in group (S)", "Кабелей в группе (S)", "Kablova u grupi (S)";
    "column.pi" => "Pi [W]", "Pi [Вт]", "Pi [W]";
    "column.kj" => "Kj", "Kj", "Kj";
    "column.eta" => "η", "η", "η";
    "column.pj" => "Pj [W]", "Pj [Вт]", "Pj [W]";
    "column.voltage" => "U [V]", "U [В]", "U [V]";
    "column.cos" => "cos φ", "cos φ", "cos φ";
    "column.length" => "L [m]", "L [м]", "L [m]";
    "column.area" => "S [mm²]", "Сечение [мм²]", "Presek [mm²]";
    "column.installation" => "Method", "Способ прокладки", "Način polaganja";
    "column.s" => "S", "S", "S";
    "column.t" => "T", "T", "T";
    "column.in" => "In [A]", "In [A]", "In [A]";
    "column.k" => "k", "k", "k";
    "column.i2" => "I2 [A]", "I2 [A]", "I2 [A]";
    "column.icalc" => "Icalc [A]", "Icalc [A]", "Icalc [A]";
    "column.rbase" => "R [Ω/km]", "R [Ом/км]", "R [Ω/km]";
    "column.sigma" => "σ", "σ", "σ";
    "column.iz" => "Iz [A]", "Iz [A]", "Iz [A]";
    "column.drop" => "ΔU %", "ΔU %", "ΔU %";
    "column.total_drop" => "Total ΔU %", "Суммарное ΔU %", "Ukupni ΔU %";
    "column.limit_drop" => "Limit ΔU %", "Предел ΔU %", "Granica ΔU %";
    "column.ampacity" => "By current", "По току", "Po struji";
    "column.drop_status" => "By ΔU", "По ΔU", "Po ΔU";
    "column.protection" => "Protection", "Защита", "Zaštita";
    "column.key" => "ΔU key", "Ключ ΔU", "Ključ ΔU";
    "column.compatibility" => "IEC compliance", "Совместимость IEC", "Usklađenost IEC";
    "desc.circuit" => "name of the circuit the segment belongs to", "название цепи, к которой относится участок", "naziv strujnog kruga kome deonica pripada";
    "desc.from" => "node the segment starts at", "узел начала участка", "čvor od kog deonica počinje";
    "desc.to" => "node the segment ends at", "узел конца участка", "čvor u kom se deonica završava";
    "desc.insulation" => "insulation type and its maximum conductor temperature", "тип изоляции и её предельная температура жилы", "tip izolacije i maksimalna temperatura provodnika";
    "desc.conductor" => "conductor material", "материал жилы", "materijal provodnika";
    "desc.cable" => "cable designation", "марка кабеля", "oznaka kabla";
    "desc.cores" => "number of loaded conductors (2 single-phase, 3 three-phase)", "число нагруженных жил (2 однофазная, 3 трёхфазная)", "broj opterećenih provodnika (2 monofazno, 3 trofazno)";
    "desc.n_parallel" => "number of cables in parallel", "число параллельных кабелей", "broj paralelnih kablova";
    "desc.group_for_s" => "circuits bunched together, used for the grouping factor", "число цепей в группе для коэффициента S", "broj strujnih krugova u grupi za faktor S";
    "desc.pi" => "installed power", "установленная мощность", "instalisana snaga";
    "desc.kj" => "demand factor", "коэффициент спроса", "faktor jednovremenosti";
    "desc.eta" => "efficiency of the load", "КПД нагрузки", "stepen korisnog dejstva";
    "desc.pj" => "demand power Pi·Kj", "расчётная мощность Pi·Kj", "vršna snaga Pi·Kj";
    "desc.voltage" => "nominal voltage", "номинальное напряжение", "nazivni napon";
    "desc.cos" => "power factor", "коэффициент мощности", "faktor snage";
    "desc.length" => "segment length", "длина участка", "dužina deonice";
    "desc.area" => "conductor cross-section", "сечение жилы", "presek provodnika";
    "desc.installation" => "installation method per IEC 60364-5-52", "способ прокладки по IEC 60364-5-52", "način polaganja prema IEC 60364-5-52";
    "desc.s" => "grouping correction factor", "поправочный коэффициент на группировку", "korekcioni faktor za grupisanje";
    "desc.t" => "ambient temperature correction factor", "поправочный коэффициент на температуру", "korekcioni faktor za temperaturu okoline";
    "desc.in" => "rated current of the protective device", "номинальный ток защитного аппарата", "nazivna struja zaštitnog uređaja";
    "desc.k" => "conventional tripping current ratio I2/In", "кратность условного тока срабатывания I2/In", "odnos struje delovanja I2/In";
    "desc.i2" => "current ensuring operation of the protective device", "ток надёжного срабатывания защиты", "struja pouzdanog delovanja zaštite";
    "desc.icalc" => "design current of the circuit", "расчётный ток цепи", "proračunska struja kruga";
    "desc.rbase" => "conductor resistance at operating temperature", "сопротивление жилы при рабочей температуре", "otpornost provodnika na radnoj temperaturi";
    "desc.sigma" => "conductivity at 20 °C", "удельная проводимость при 20 °C", "specifična provodnost na 20 °C";
    "desc.iz" => "derated current-carrying capacity of one cable", "допустимый длительный ток одного кабеля с поправками", "trajno dozvoljena struja jednog kabla sa korekcijama";
    "desc.drop" => "voltage drop of the segment", "падение напряжения на участке", "pad napona na deonici";
    "desc.total_drop" => "voltage drop from the origin of the circuit", "падение напряжения от начала цепи", "pad napona od početka kruga";
    "desc.limit_drop" => "permitted voltage drop", "допустимое падение напряжения", "dozvoljeni pad napona";
    "desc.ampacity" => "Icalc per cable does not exceed Iz", "Icalc на кабель не превышает Iz", "Icalc po kablu ne prelazi Iz";
    "desc.drop_status" => "ΔU does not exceed the limit", "ΔU не превышает предел", "ΔU ne prelazi granicu";
    "desc.protection" => "Icalc ≤ In ≤ Iz and I2 ≤ 1.45·Iz", "Icalc ≤ In ≤ Iz и I2 ≤ 1,45·Iz", "Icalc ≤ In ≤ Iz i I2 ≤ 1,45·Iz";
    "desc.key" => "voltage drop limit category", "категория предела падения напряжения", "kategorija granice pada napona";
    "desc.compatibility" => "all checks pass", "все проверки пройдены", "sve provere zadovoljene";
    "status.ok" => "OK", "OK", "OK";
    "status.fail" => "FAIL", "НЕ СООТВ.", "NE ZADOVOLJAVA";
    "status.na" => "N/A", "Н/Д", "N/P";
    "status.no_data" => "no data", "нет данных", "nema podataka";
    "export.doc_title" => "Cable sizing calculation", "Расчёт сечения кабелей", "Proračun preseka kablova";
    "export.subtitle" => "Low-voltage installation", "Электроустановка низкого напряжения", "Niskonaponska instalacija";
    "export.standard" => "Per IEC 60364-5-52: current-carrying capacity, voltage drop and overload protection.", "По IEC 60364-5-52: допустимый ток, падение напряжения и защита от перегрузки.", "Prema IEC 60364-5-52: trajno dozvoljena struja, pad napona i zaštita od preopterećenja.";
    "export.legend_title" => "Legend", "Обозначения", "Legenda";
    "rec.increase_section" => "Increase the section to", "Увеличить сечение до", "Povećati presek na";
    "rec.change_method" => "Change the method to", "Сменить метод на", "Promeniti način polaganja na";
    "rec.switch_xlpe" => "Switch to XLPE and", "Перейти на XLPE и", "Preći na XLPE i";
    "rec.split" => "Split into {} parallel cables", "Разделить на {} параллельных кабеля", "Podeliti na {} paralelna kabla";
    "unit.mm2" => "mm²", "мм²", "mm²";
    "rec.method" => "method", "метод", "način";
    "rec.fallback" => "Reduce the number of cables in the group (to raise S) or raise the voltage.", "Снизить число кабелей в группе (для увеличения S) или повысить напряжение.", "Smanjiti broj kablova u grupi (za veći S) ili povećati napon.";
    "select.minor" => "minimal deviations", "минимальные отклонения", "minimalna odstupanja";
    "select.in_below_ib" => "In < Ib by {} A", "In < Ib на {} A", "In < Ib za {} A";
    "select.in_above_iz" => "In > Iz_tot by {} A", "In > Iz_tot на {} A", "In > Iz_tot za {} A";
    "output.parameter" => "Parameter", "Параметр", "Parametar";
    "output.value" => "Value", "Значение", "Vrednost";
    "output.per_cable" => "Icalc per cable [A]", "Icalc на кабель [A]", "Icalc po kablu [A]";
    "output.reactance" => "X [Ω/km]", "X [Ом/км]", "X [Ω/km]";
    "output.base_iz" => "Iz from table [A]", "Iz по таблице [A]", "Iz iz tabele [A]";
    "output.iz_total" => "Iz total [A]", "Iz суммарный [A]", "Iz ukupno [A]";
    "output.breaker_window" => "Icalc ≤ In ≤ Iz window [A]", "Диапазон Icalc ≤ In ≤ Iz [A]", "Opseg Icalc ≤ In ≤ Iz [A]";
    "output.total_drop_status" => "By total ΔU", "По суммарному ΔU", "Po ukupnom ΔU";
    "output.warning" => "Warning", "Предупреждение", "Upozorenje";
    "output.recommendation" => "Recommendation", "Рекомендация", "Preporuka";
    "output.candidate" => "Closest option", "Ближайший вариант", "Najbliža opcija";
    "output.added" => "Added as row", "Добавлено строкой", "Dodato kao red";
    "warning.voltage_phase" => "230 V with three loaded conductors: check the voltage against the number of phases.", "230 В при трёх нагруженных жилах: проверьте напряжение и число фаз.", "230 V sa tri opterećena provodnika: proverite napon i broj faza.";
    "warning.temperature_range" => "Temperature {} °C is outside the correction table for this insulation and medium.", "Температура {} °C вне таблицы поправок для этой изоляции и среды.", "Temperatura {} °C je van tabele korekcija za ovu izolaciju i sredinu.";
}
